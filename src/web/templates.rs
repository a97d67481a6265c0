use std::borrow::Cow;

use chrono::{Datelike, Utc};

use crate::web::session::Flash;

const APP_TITLE: &str = "Image Text Translator";

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; min-height: 100vh; display: flex; flex-direction: column; }
        header { background: #ffffff; padding: 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; max-width: 960px; margin: 0 auto; }
        .header-bar h1 { margin: 0; font-size: 1.5rem; }
        nav { display: flex; flex-wrap: wrap; gap: 0.5rem; }
        nav a { color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.4rem 0.85rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        nav a:hover { background: #bfdbfe; border-color: #93c5fd; }
        main { flex: 1; padding: 2rem 1.5rem; max-width: 960px; width: 100%; margin: 0 auto; box-sizing: border-box; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 2rem; }
        .panel h2 { margin-top: 0; }
        .narrow { max-width: 480px; margin: 0 auto; }
        label { display: block; margin-top: 1rem; margin-bottom: 0.5rem; font-weight: 600; }
        input[type="text"], input[type="password"], textarea { width: 100%; padding: 0.75rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; font-size: 1rem; box-sizing: border-box; }
        textarea { min-height: 8rem; resize: vertical; }
        button { margin-top: 1.5rem; padding: 0.85rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1rem; border: 1px solid transparent; white-space: pre-wrap; word-break: break-word; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.info { background: #eff6ff; border-color: #bfdbfe; color: #1e40af; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
"#;

const NAV_LINKS: &[(&str, &str)] = &[
    ("/home", "Home"),
    ("/translation", "Translate"),
    ("/about", "About"),
    ("/help", "Help"),
    ("/feedback", "Feedback"),
    ("/privacy", "Privacy"),
    ("/requirements", "Requirements"),
    ("/logout", "Log out"),
];

pub struct PageLayout<'a> {
    pub title: &'a str,
    /// Logged-in user; anonymous pages get login/register links instead of the app nav.
    pub username: Option<&'a str>,
    pub flashes: &'a [Flash],
    pub body_html: Cow<'a, str>,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        title,
        username,
        flashes,
        body_html,
    } = layout;

    let nav_html = match username {
        Some(_) => NAV_LINKS
            .iter()
            .map(|(href, label)| format!(r#"<a href="{href}">{label}</a>"#))
            .collect::<String>(),
        None => r#"<a href="/login">Log in</a><a href="/register">Register</a>"#.to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title} | {app}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{app}</h1>
            <nav>{nav_html}</nav>
        </div>
    </header>
    <main>
        {flashes}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        app = APP_TITLE,
        styles = PAGE_BASE_STYLES,
        nav_html = nav_html,
        flashes = render_flashes(flashes),
        body_html = body_html,
        footer = render_footer(),
    )
}

pub fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|flash| {
            format!(
                r#"<div class="flash {class}">{message}</div>"#,
                class = flash.level.css_class(),
                message = escape_html(&flash.message),
            )
        })
        .collect()
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} {app}</footer>"#,
        year = current_year,
        app = APP_TITLE,
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
