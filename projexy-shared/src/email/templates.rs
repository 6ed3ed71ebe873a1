//! One-paragraph HTML bodies for transactional mail

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn link(url: &str) -> String {
    let url = escape(url);
    format!(r#"<a href="{url}">{url}</a>"#)
}

pub fn render_verification(verify_url: &str) -> String {
    format!(
        "<p>Welcome to ProjeXY! Please click the link below to verify your email address:</p><p>{}</p>",
        link(verify_url)
    )
}

pub fn render_password_reset(reset_url: &str) -> String {
    format!(
        "<p>Someone asked to reset the password of your ProjeXY account. \
         The link below is valid for one hour:</p><p>{}</p>\
         <p>If this wasn't you, ignore this email.</p>",
        link(reset_url)
    )
}

pub fn render_invite(inviter_name: &str, project_name: &str, project_url: &str) -> String {
    format!(
        "<p>{} invited you to collaborate on <strong>{}</strong> in ProjeXY.</p><p>{}</p>",
        escape(inviter_name),
        escape(project_name),
        link(project_url)
    )
}
