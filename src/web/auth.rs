use std::borrow::Cow;

use axum::{
    extract::{Form, Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    storage::CredentialError,
    web::{
        AppState,
        session::FlashLevel,
        templates::{PageLayout, render_page},
    },
};

/// The logged-in user, inserted by [`require_login`] for protected handlers.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub username: String,
}

#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Gate for every protected route: anonymous requests are sent to `/login`.
pub async fn require_login(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match state.sessions().current_user(&jar).await {
        Some(username) => {
            request.extensions_mut().insert(CurrentUser { username });
            next.run(request).await
        }
        None => Redirect::to("/login").into_response(),
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    if state.sessions().current_user(&jar).await.is_some() {
        return Err(Redirect::to("/home"));
    }

    let flashes = state.sessions().take_flashes(&jar).await;
    Ok(Html(render_page(PageLayout {
        title: "Log in",
        username: None,
        flashes: &flashes,
        body_html: Cow::Owned(credentials_form(
            "Log in",
            "/login",
            "Log in",
            r#"No account yet? <a href="/register">Register here</a>."#,
        )),
    })))
}

pub async fn register_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    if state.sessions().current_user(&jar).await.is_some() {
        return Err(Redirect::to("/home"));
    }

    let flashes = state.sessions().take_flashes(&jar).await;
    Ok(Html(render_page(PageLayout {
        title: "Register",
        username: None,
        flashes: &flashes,
        body_html: Cow::Owned(credentials_form(
            "Create an account",
            "/register",
            "Register",
            r#"Already registered? <a href="/login">Log in</a>."#,
        )),
    })))
}

pub async fn process_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> (CookieJar, Redirect) {
    let username = form.username.as_str();
    let sessions = state.sessions();

    match state.credentials().register(username, &form.password).await {
        Ok(()) => {
            info!(%username, "registered new user");
            let jar = sessions
                .flash(jar, FlashLevel::Success, "Registration successful! Please log in.")
                .await;
            (jar, Redirect::to("/login"))
        }
        Err(err) => {
            if matches!(err, CredentialError::Io(_) | CredentialError::Hash(_)) {
                error!(?err, "failed to register user");
                let jar = sessions
                    .flash(jar, FlashLevel::Error, "Registration failed, please try again later.")
                    .await;
                return (jar, Redirect::to("/register"));
            }
            let jar = sessions.flash(jar, FlashLevel::Error, err.to_string()).await;
            (jar, Redirect::to("/register"))
        }
    }
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> (CookieJar, Redirect) {
    let username = form.username.as_str();
    let sessions = state.sessions();

    match state.credentials().authenticate(username, &form.password).await {
        Ok(()) => {
            info!(%username, "login succeeded");
            let jar = sessions.start(jar, username).await;
            let jar = sessions
                .flash(jar, FlashLevel::Success, "Login successful!")
                .await;
            (jar, Redirect::to("/home"))
        }
        Err(CredentialError::Io(err)) => {
            error!(?err, "failed to read credential store during login");
            let jar = sessions
                .flash(jar, FlashLevel::Error, "Login is unavailable, please try again later.")
                .await;
            (jar, Redirect::to("/login"))
        }
        Err(_) => {
            warn!(%username, "login failed");
            let jar = sessions
                .flash(jar, FlashLevel::Error, CredentialError::InvalidCredentials.to_string())
                .await;
            (jar, Redirect::to("/login"))
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let sessions = state.sessions();
    let jar = sessions.end(jar).await;
    let jar = sessions
        .flash(jar, FlashLevel::Info, "You have been logged out.")
        .await;
    (jar, Redirect::to("/login"))
}

fn credentials_form(heading: &str, action: &str, submit: &str, footnote: &str) -> String {
    format!(
        r#"        <section class="panel narrow">
            <h2>{heading}</h2>
            <form method="post" action="{action}">
                <label for="username">Username</label>
                <input id="username" name="username" type="text" autocomplete="username" required>
                <label for="password">Password</label>
                <input id="password" name="password" type="password" required>
                <button type="submit">{submit}</button>
            </form>
            <p class="note">{footnote}</p>
        </section>"#
    )
}
