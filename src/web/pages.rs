use std::borrow::Cow;

use axum::{
    extract::{Extension, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;

use crate::web::{
    AppState,
    auth::CurrentUser,
    templates::{PageLayout, escape_html, render_page},
};

const ABOUT_HTML: &str = r#"        <section class="panel">
            <h2>About us</h2>
            <p>Image Text Translator reads the text in a photo or screenshot and translates it into English.</p>
            <p class="note">Text recognition and translation are performed by external engines configured by the site operator.</p>
        </section>"#;

const HELP_HTML: &str = r#"        <section class="panel">
            <h2>Help</h2>
            <ol>
                <li>Open <a href="/translation">Translate</a>.</li>
                <li>Choose a PNG, JPG, JPEG or GIF image containing text.</li>
                <li>Submit the form. The recognised text and its English translation appear above the form.</li>
            </ol>
            <p class="note">Sharp, high-contrast images give the best results. If no text is found, try a larger or clearer image.</p>
        </section>"#;

const PRIVACY_HTML: &str = r#"        <section class="panel">
            <h2>Privacy policy</h2>
            <p>Your username and a salted one-way hash of your password are stored on this server. Your password itself is never stored.</p>
            <p>Uploaded images are kept on the server and their text is sent to the configured recognition and translation services.</p>
            <p>Feedback you submit is stored without your username.</p>
        </section>"#;

const REQUIREMENTS_HTML: &str = r#"        <section class="panel">
            <h2>Functional requirements</h2>
            <ul>
                <li>Users can register and log in with a username and password.</li>
                <li>Every page except login and registration requires an active session.</li>
                <li>Logged-in users can upload PNG, JPG, JPEG or GIF images.</li>
                <li>Text is extracted from the uploaded image and translated into English.</li>
                <li>Users can submit feedback about the service.</li>
            </ul>
        </section>"#;

pub async fn index() -> Redirect {
    Redirect::to("/home")
}

pub async fn home(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    let body = format!(
        r#"        <section class="panel">
            <h2>Welcome, {username}!</h2>
            <p>Upload an image on the <a href="/translation">Translate</a> page to extract its text and translate it into English.</p>
        </section>"#,
        username = escape_html(&user.username),
    );
    render_gated(&state, &user, &jar, "Home", Cow::Owned(body)).await
}

pub async fn about(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    render_gated(&state, &user, &jar, "About", Cow::Borrowed(ABOUT_HTML)).await
}

pub async fn help(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    render_gated(&state, &user, &jar, "Help", Cow::Borrowed(HELP_HTML)).await
}

pub async fn privacy(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    render_gated(&state, &user, &jar, "Privacy", Cow::Borrowed(PRIVACY_HTML)).await
}

pub async fn requirements(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    render_gated(
        &state,
        &user,
        &jar,
        "Requirements",
        Cow::Borrowed(REQUIREMENTS_HTML),
    )
    .await
}

/// Renders a page for a logged-in user, consuming any pending flashes.
pub async fn render_gated(
    state: &AppState,
    user: &CurrentUser,
    jar: &CookieJar,
    title: &str,
    body_html: Cow<'_, str>,
) -> Html<String> {
    let flashes = state.sessions().take_flashes(jar).await;
    Html(render_page(PageLayout {
        title,
        username: Some(&user.username),
        flashes: &flashes,
        body_html,
    }))
}
