use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, feedback, pages, translation};

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(pages::index))
        .route("/home", get(pages::home))
        .route("/logout", get(auth::logout))
        .route("/about", get(pages::about))
        .route("/help", get(pages::help))
        .route("/privacy", get(pages::privacy))
        .route("/requirements", get(pages::requirements))
        .route(
            "/feedback",
            get(feedback::feedback_page).post(feedback::submit_feedback),
        )
        .route("/translation", get(translation::translation_page))
        .route("/translate-image", post(translation::translate_image))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ));

    Router::new()
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/healthz", get(healthz))
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config().max_upload_bytes))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use axum::{
        body::{Body, to_bytes},
        http::{Request, Response, header},
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        pipeline::testing::{FixedExtractor, RecordingTranslator},
        web::session::SESSION_COOKIE,
    };

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const BOUNDARY: &str = "----ocr-test-boundary";

    struct Harness {
        dir: TempDir,
        app: Router,
        translator: Arc<RecordingTranslator>,
        cookie: Option<String>,
    }

    impl Harness {
        async fn new(extracted: &str) -> Self {
            Self::with_engines(
                FixedExtractor::text(extracted),
                RecordingTranslator::default(),
            )
            .await
        }

        async fn with_engines(
            extractor: FixedExtractor,
            translator: RecordingTranslator,
        ) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().to_path_buf();
            let vars: HashMap<&str, String> = HashMap::from([
                ("USER_DATA_FILE", root.join("users.txt").display().to_string()),
                ("FEEDBACK_FILE", root.join("feedback.txt").display().to_string()),
                ("UPLOAD_FOLDER", root.join("uploads").display().to_string()),
            ]);
            let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

            let translator = Arc::new(translator);
            let state = AppState::with_engines(config, Arc::new(extractor), translator.clone())
                .await
                .unwrap();

            Self {
                dir,
                app: build_router(state),
                translator,
                cookie: None,
            }
        }

        async fn send(&mut self, mut request: Request<Body>) -> Response<Body> {
            if let Some(cookie) = &self.cookie {
                request
                    .headers_mut()
                    .insert(header::COOKIE, cookie.parse().unwrap());
            }
            let response = self.app.clone().oneshot(request).await.unwrap();
            for value in response.headers().get_all(header::SET_COOKIE) {
                let pair = value.to_str().unwrap().split(';').next().unwrap().trim();
                if pair.starts_with(SESSION_COOKIE) {
                    self.cookie = Some(pair.to_string());
                }
            }
            response
        }

        async fn get(&mut self, uri: &str) -> Response<Body> {
            self.send(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn get_text(&mut self, uri: &str) -> String {
            let response = self.get(uri).await;
            assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
            body_text(response).await
        }

        async fn post_form(&mut self, uri: &str, form: &str) -> Response<Body> {
            let request = Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap();
            self.send(request).await
        }

        async fn upload(&mut self, file_name: &str, bytes: &[u8]) -> Response<Body> {
            self.upload_field("imageUpload", file_name, bytes).await
        }

        async fn upload_field(
            &mut self,
            field: &str,
            file_name: &str,
            bytes: &[u8],
        ) -> Response<Body> {
            let mut body = Vec::new();
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

            let request = Request::post("/translate-image")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }

        async fn log_in(&mut self, username: &str, password: &str) {
            let form = format!("username={username}&password={password}");
            let response = self.post_form("/register", &form).await;
            assert_eq!(location(&response), "/login");
            let response = self.post_form("/login", &form).await;
            assert_eq!(location(&response), "/home");
        }
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn anonymous_requests_are_sent_to_login() {
        let mut harness = Harness::new("hola").await;
        for uri in [
            "/",
            "/home",
            "/logout",
            "/about",
            "/help",
            "/privacy",
            "/requirements",
            "/feedback",
            "/translation",
        ] {
            let response = harness.get(uri).await;
            assert_eq!(location(&response), "/login", "GET {uri}");
        }

        let response = harness.post_form("/feedback", "feedback=hi").await;
        assert_eq!(location(&response), "/login");
        let response = harness.upload("photo.png", PNG_BYTES).await;
        assert_eq!(location(&response), "/login");
        assert_eq!(harness.translator.call_count(), 0);
    }

    #[tokio::test]
    async fn public_pages_render_without_a_session() {
        let mut harness = Harness::new("hola").await;
        assert!(harness.get_text("/login").await.contains("action=\"/login\""));
        assert!(
            harness
                .get_text("/register")
                .await
                .contains("action=\"/register\"")
        );
        assert_eq!(harness.get("/healthz").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_login_flashes_once() {
        let mut harness = Harness::new("hola").await;

        let response = harness
            .post_form("/register", "username=alice&password=s3cret")
            .await;
        assert_eq!(location(&response), "/login");

        let page = harness.get_text("/login").await;
        assert!(page.contains("Registration successful! Please log in."));
        let page = harness.get_text("/login").await;
        assert!(!page.contains("Registration successful!"));

        let response = harness
            .post_form("/login", "username=alice&password=s3cret")
            .await;
        assert_eq!(location(&response), "/home");

        let page = harness.get_text("/home").await;
        assert!(page.contains("Login successful!"));
        assert!(page.contains("Welcome, alice!"));
        assert!(!harness.get_text("/home").await.contains("Login successful!"));

        let users = std::fs::read_to_string(harness.dir.path().join("users.txt")).unwrap();
        assert!(users.starts_with("alice,"));
        assert!(!users.contains("s3cret"));
    }

    #[tokio::test]
    async fn logged_in_users_skip_the_login_form() {
        let mut harness = Harness::new("hola").await;
        harness.log_in("alice", "pw").await;

        assert_eq!(location(&harness.get("/login").await), "/home");
        assert_eq!(location(&harness.get("/register").await), "/home");
        assert_eq!(location(&harness.get("/").await), "/home");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let mut harness = Harness::new("hola").await;
        harness
            .post_form("/register", "username=bob&password=one")
            .await;

        let response = harness
            .post_form("/register", "username=bob&password=two")
            .await;
        assert_eq!(location(&response), "/register");
        assert!(
            harness
                .get_text("/register")
                .await
                .contains("Username already exists!")
        );

        let response = harness.post_form("/login", "username=bob&password=one").await;
        assert_eq!(location(&response), "/home");
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let mut harness = Harness::new("hola").await;
        harness
            .post_form("/register", "username=carol&password=right")
            .await;
        harness.get_text("/login").await;

        let response = harness
            .post_form("/login", "username=carol&password=wrong")
            .await;
        assert_eq!(location(&response), "/login");
        let wrong_password = harness.get_text("/login").await;

        let response = harness
            .post_form("/login", "username=nobody&password=right")
            .await;
        assert_eq!(location(&response), "/login");
        let unknown_user = harness.get_text("/login").await;

        assert!(wrong_password.contains("Invalid username or password!"));
        assert_eq!(wrong_password, unknown_user);
    }

    #[tokio::test]
    async fn feedback_is_appended_to_the_file() {
        let mut harness = Harness::new("hola").await;
        harness.log_in("dave", "pw").await;

        let response = harness.post_form("/feedback", "feedback=great+app").await;
        assert_eq!(location(&response), "/feedback");
        assert!(
            harness
                .get_text("/feedback")
                .await
                .contains("Feedback submitted successfully!")
        );

        let stored = std::fs::read_to_string(harness.dir.path().join("feedback.txt")).unwrap();
        assert_eq!(stored, "great app\n");
    }

    #[tokio::test]
    async fn disallowed_upload_is_not_saved() {
        let mut harness = Harness::new("hola").await;
        harness.log_in("erin", "pw").await;

        let response = harness.upload("photo.txt", b"plain text").await;
        assert_eq!(location(&response), "/translation");

        let page = harness.get_text("/translation").await;
        assert!(page.contains("Invalid file type. Only image files are allowed (png, jpg, jpeg, gif)."));
        assert!(!harness.dir.path().join("uploads/photo.txt").exists());
        assert_eq!(harness.translator.call_count(), 0);
    }

    #[tokio::test]
    async fn image_upload_is_extracted_and_translated() {
        let mut harness = Harness::new("hola mundo").await;
        harness.log_in("frank", "pw").await;

        let response = harness.upload("photo.png", PNG_BYTES).await;
        assert_eq!(location(&response), "/translation");

        let page = harness.get_text("/translation").await;
        assert!(page.contains("Text extracted: hola mundo"));
        assert!(page.contains("Translated text: [auto-&gt;en] hola mundo"));
        assert_eq!(harness.translator.call_count(), 1);

        let saved = std::fs::read(harness.dir.path().join("uploads/photo.png")).unwrap();
        assert_eq!(saved, PNG_BYTES);
    }

    #[tokio::test]
    async fn blank_extraction_skips_translation() {
        let mut harness = Harness::new("  \n ").await;
        harness.log_in("grace", "pw").await;

        harness.upload("scan.png", PNG_BYTES).await;
        let page = harness.get_text("/translation").await;
        assert!(page.contains("No text found in the image."));
        assert_eq!(harness.translator.call_count(), 0);
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let mut harness = Harness::new("hola").await;
        harness.log_in("heidi", "pw").await;

        let response = harness.get("/logout").await;
        assert_eq!(location(&response), "/login");
        assert!(
            harness
                .get_text("/login")
                .await
                .contains("You have been logged out.")
        );
        assert_eq!(location(&harness.get("/home").await), "/login");
    }

    async fn rejected_upload_message(
        harness: &mut Harness,
        field: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> String {
        let response = harness.upload_field(field, file_name, bytes).await;
        assert_eq!(location(&response), "/translation");
        harness.get_text("/translation").await
    }

    #[tokio::test]
    async fn upload_failures_are_flashed_back_to_the_form() {
        let mut harness = Harness::new("hola").await;
        harness.log_in("ivan", "pw").await;

        let page =
            rejected_upload_message(&mut harness, "attachment", "photo.png", PNG_BYTES).await;
        assert!(page.contains("No file part"));

        let page = rejected_upload_message(&mut harness, "imageUpload", "", PNG_BYTES).await;
        assert!(page.contains("No selected file"));

        let page =
            rejected_upload_message(&mut harness, "imageUpload", "photo.png", b"just a note").await;
        assert!(page.contains("The uploaded file is not a valid PNG, JPEG or GIF image."));

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let page = rejected_upload_message(&mut harness, "imageUpload", "p.png", &jpeg).await;
        assert!(page.contains("The uploaded file is not a valid PNG, JPEG or GIF image."));

        let uploads = harness.dir.path().join("uploads");
        assert!(!uploads.join("photo.png").exists());
        assert!(!uploads.join("p.png").exists());
        assert_eq!(harness.translator.call_count(), 0);
    }

    #[tokio::test]
    async fn non_multipart_upload_is_treated_as_missing_file() {
        let mut harness = Harness::new("hola").await;
        harness.log_in("judy", "pw").await;

        let response = harness
            .post_form("/translate-image", "imageUpload=photo.png")
            .await;
        assert_eq!(location(&response), "/translation");
        assert!(harness.get_text("/translation").await.contains("No file part"));
        assert_eq!(harness.translator.call_count(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_is_reported_with_its_stage() {
        let mut harness =
            Harness::with_engines(FixedExtractor::failing(), RecordingTranslator::default()).await;
        harness.log_in("ken", "pw").await;

        let response = harness.upload("photo.png", PNG_BYTES).await;
        assert_eq!(location(&response), "/translation");

        let page = harness.get_text("/translation").await;
        assert!(page.contains("Error extracting text from the image"));
        assert!(!page.contains("Text extracted:"));
        assert_eq!(harness.translator.call_count(), 0);
    }

    #[tokio::test]
    async fn translation_failure_still_shows_the_extracted_text() {
        let mut harness = Harness::with_engines(
            FixedExtractor::text("guten tag"),
            RecordingTranslator::failing(),
        )
        .await;
        harness.log_in("liam", "pw").await;

        let response = harness.upload("photo.png", PNG_BYTES).await;
        assert_eq!(location(&response), "/translation");

        let page = harness.get_text("/translation").await;
        let extracted = page.find("Text extracted: guten tag").unwrap();
        let failure = page.find("Error translating the extracted text").unwrap();
        assert!(extracted < failure);
        assert!(!page.contains("Translated text:"));
        assert_eq!(harness.translator.call_count(), 1);
    }

    #[tokio::test]
    async fn usernames_are_not_trimmed() {
        let mut harness = Harness::new("hola").await;
        let response = harness
            .post_form("/register", "username=mia+&password=pw")
            .await;
        assert_eq!(location(&response), "/login");

        let response = harness.post_form("/login", "username=mia&password=pw").await;
        assert_eq!(location(&response), "/login");
        let response = harness
            .post_form("/login", "username=mia+&password=pw")
            .await;
        assert_eq!(location(&response), "/home");
        assert!(harness.get_text("/home").await.contains("Welcome, mia !"));
    }
}
