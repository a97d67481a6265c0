use std::borrow::Cow;

use axum::{
    extract::{Extension, Form, State},
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    storage::FeedbackError,
    web::{AppState, auth::CurrentUser, pages::render_gated, session::FlashLevel},
};

const FEEDBACK_FORM_HTML: &str = r#"        <section class="panel">
            <h2>Feedback</h2>
            <p class="note">Tell us what works, what doesn't, and which languages you need.</p>
            <form method="post" action="/feedback">
                <label for="feedback">Your feedback</label>
                <textarea id="feedback" name="feedback" required></textarea>
                <button type="submit">Submit feedback</button>
            </form>
        </section>"#;

#[derive(Deserialize)]
pub struct FeedbackForm {
    #[serde(default)]
    pub feedback: String,
}

pub async fn feedback_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> Html<String> {
    render_gated(
        &state,
        &user,
        &jar,
        "Feedback",
        Cow::Borrowed(FEEDBACK_FORM_HTML),
    )
    .await
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<FeedbackForm>,
) -> (CookieJar, Redirect) {
    let sessions = state.sessions();
    let jar = match state.feedback().append(&form.feedback).await {
        Ok(()) => {
            info!(user = %user.username, "feedback received");
            sessions
                .flash(jar, FlashLevel::Success, "Feedback submitted successfully!")
                .await
        }
        Err(FeedbackError::Io(err)) => {
            error!(?err, "failed to store feedback");
            sessions
                .flash(
                    jar,
                    FlashLevel::Error,
                    "Your feedback could not be saved, please try again later.",
                )
                .await
        }
        Err(err) => sessions.flash(jar, FlashLevel::Error, err.to_string()).await,
    };

    (jar, Redirect::to("/feedback"))
}
