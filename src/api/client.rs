use cfg_if::cfg_if;
use serde::{de::DeserializeOwned, Serialize};

use super::error::ApiError;
use super::types::{
    AskMode, AskRequest, AskResponse, ChainStatus, ChatInput, ChatResponse, CreateUserRequest,
    FileList, HistoryEntry, ResetPasswordRequest, SelectFilesResponse, StatusMessage,
    TokenResponse,
};
use crate::chat::reconciler::ChatBackend;
use crate::storage::{self, BrowserStorage, KeyValueStore, AUTH_TOKEN, TOKEN_TYPE, USERNAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Every backend route the client calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    Token,
    CreateUser,
    ResetPassword,
    ChainStatus,
    InitializeChain,
    Ask(AskMode),
    StartChat,
    ChatMessage,
    ChatHistory(&'a str),
    EndChat(&'a str),
    ListFiles,
    SelectFiles,
    UploadFiles,
    DeleteFile(i64),
}

impl Endpoint<'_> {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::ChainStatus | Endpoint::ChatHistory(_) | Endpoint::ListFiles => Method::Get,
            Endpoint::ResetPassword => Method::Put,
            Endpoint::EndChat(_) | Endpoint::DeleteFile(_) => Method::Delete,
            _ => Method::Post,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Token => "/api/auth/token".to_string(),
            Endpoint::CreateUser => "/api/auth/create_user".to_string(),
            Endpoint::ResetPassword => "/api/auth/reset_password".to_string(),
            Endpoint::ChainStatus => "/api/chain/status".to_string(),
            Endpoint::InitializeChain => "/api/chain/initialize".to_string(),
            Endpoint::Ask(mode) => mode.endpoint().to_string(),
            Endpoint::StartChat => "/api/chat/start".to_string(),
            Endpoint::ChatMessage => "/api/chat/message".to_string(),
            Endpoint::ChatHistory(id) => format!("/api/chat/history/{}", urlencoding::encode(id)),
            Endpoint::EndChat(id) => format!("/api/chat/end/{}", urlencoding::encode(id)),
            Endpoint::ListFiles => "/api/files/list_all_uploaded_files".to_string(),
            Endpoint::SelectFiles => "/api/files/select_files".to_string(),
            Endpoint::UploadFiles => "/api/files/upload_files".to_string(),
            Endpoint::DeleteFile(id) => format!("/api/files/{}", id),
        }
    }
}

pub enum Payload {
    Empty,
    Json(String),
    Form(String),
    #[cfg(feature = "hydrate")]
    Multipart(web_sys::FormData),
}

#[derive(Debug, Clone, Default)]
pub struct HttpApi<S = BrowserStorage> {
    store: S,
}

impl<S: KeyValueStore> HttpApi<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let form = format!(
            "username={}&password={}",
            urlencoding::encode(username),
            urlencoding::encode(password)
        );
        let token: TokenResponse = self.request(Endpoint::Token, Payload::Form(form)).await?;

        self.store.set(AUTH_TOKEN, &token.access_token);
        self.store.set(TOKEN_TYPE, &token.token_type);
        self.store.set(USERNAME, username);
        log::info!("Signed in as {}", username);

        Ok(token)
    }

    pub async fn register(&self, user: &CreateUserRequest) -> Result<StatusMessage, ApiError> {
        self.request(Endpoint::CreateUser, json(user)?).await
    }

    pub async fn reset_password(
        &self,
        reset: &ResetPasswordRequest,
    ) -> Result<StatusMessage, ApiError> {
        self.request(Endpoint::ResetPassword, json(reset)?).await
    }

    /// Sign-out is purely local: every stored key is dropped.
    pub fn logout(&self) {
        storage::clear_all(&self.store);
        log::info!("Signed out");
    }

    pub fn is_signed_in(&self) -> bool {
        storage::authorization(&self.store).is_some()
    }

    pub async fn chain_status(&self) -> Result<ChainStatus, ApiError> {
        self.request(Endpoint::ChainStatus, Payload::Empty).await
    }

    pub async fn initialize_chain(&self) -> Result<StatusMessage, ApiError> {
        self.request(Endpoint::InitializeChain, Payload::Empty).await
    }

    pub async fn ask(&self, mode: AskMode, request: &AskRequest) -> Result<AskResponse, ApiError> {
        self.request(Endpoint::Ask(mode), json(request)?).await
    }

    pub async fn start_chat(&self) -> Result<ChatResponse, ApiError> {
        self.request(Endpoint::StartChat, Payload::Json("{}".to_string()))
            .await
    }

    pub async fn send_chat_message(&self, input: &ChatInput) -> Result<ChatResponse, ApiError> {
        self.request(Endpoint::ChatMessage, json(input)?).await
    }

    pub async fn chat_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        self.request(Endpoint::ChatHistory(session_id), Payload::Empty)
            .await
    }

    pub async fn end_chat(&self, session_id: &str) -> Result<(), ApiError> {
        self.request_unit(Endpoint::EndChat(session_id), Payload::Empty)
            .await
    }

    pub async fn list_files(&self) -> Result<FileList, ApiError> {
        self.request(Endpoint::ListFiles, Payload::Empty).await
    }

    pub async fn select_files(&self, file_ids: &[i64]) -> Result<SelectFilesResponse, ApiError> {
        self.request(Endpoint::SelectFiles, json(&file_ids)?).await
    }

    pub async fn delete_file(&self, file_id: i64) -> Result<(), ApiError> {
        self.request_unit(Endpoint::DeleteFile(file_id), Payload::Empty)
            .await
    }

    #[cfg(feature = "hydrate")]
    pub async fn upload_files(&self, files: &[web_sys::File]) -> Result<StatusMessage, ApiError> {
        let form = web_sys::FormData::new().map_err(js_error)?;
        for file in files {
            form.append_with_blob_and_filename("files", file, &file.name())
                .map_err(js_error)?;
        }
        self.request(Endpoint::UploadFiles, Payload::Multipart(form))
            .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint<'_>,
        payload: Payload,
    ) -> Result<T, ApiError> {
        let auth = storage::authorization(&self.store);
        let (status, body) = transport(endpoint.method(), &endpoint.path(), payload, auth.as_deref()).await?;
        decode(status, &body, auth.is_some())
    }

    async fn request_unit(&self, endpoint: Endpoint<'_>, payload: Payload) -> Result<(), ApiError> {
        let auth = storage::authorization(&self.store);
        let (status, body) = transport(endpoint.method(), &endpoint.path(), payload, auth.as_deref()).await?;
        check_status(status, &body, auth.is_some())
    }
}

fn json<T: Serialize + ?Sized>(body: &T) -> Result<Payload, ApiError> {
    serde_json::to_string(body)
        .map(Payload::Json)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn check_status(status: u16, body: &str, authenticated: bool) -> Result<(), ApiError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    // a 401 on an unauthenticated call (bad login) keeps the backend's reason
    if status == 401 && authenticated {
        log::warn!("Backend rejected the stored credential");
        return Err(ApiError::Unauthorized);
    }
    Err(ApiError::from_response(status, body))
}

pub(crate) fn decode<T: DeserializeOwned>(
    status: u16,
    body: &str,
    authenticated: bool,
) -> Result<T, ApiError> {
    check_status(status, body, authenticated)?;
    serde_json::from_str(body).map_err(|e| {
        log::error!("Failed to decode response: {}", e);
        ApiError::Decode(e.to_string())
    })
}

impl<S: KeyValueStore> ChatBackend for HttpApi<S> {
    async fn chain_status(&self) -> Result<ChainStatus, ApiError> {
        HttpApi::chain_status(self).await
    }

    async fn start_chat(&self) -> Result<ChatResponse, ApiError> {
        HttpApi::start_chat(self).await
    }

    async fn send_chat_message(&self, input: &ChatInput) -> Result<ChatResponse, ApiError> {
        HttpApi::send_chat_message(self, input).await
    }

    async fn chat_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        HttpApi::chat_history(self, session_id).await
    }

    async fn end_chat(&self, session_id: &str) -> Result<(), ApiError> {
        HttpApi::end_chat(self, session_id).await
    }
}

cfg_if! {
    if #[cfg(feature = "hydrate")] {
        use wasm_bindgen::{JsCast, JsValue};
        use wasm_bindgen_futures::JsFuture;

        fn js_error(e: JsValue) -> ApiError {
            ApiError::Network(format!("{:?}", e))
        }

        async fn transport(
            method: Method,
            path: &str,
            payload: Payload,
            auth: Option<&str>,
        ) -> Result<(u16, String), ApiError> {
            let window = web_sys::window()
                .ok_or_else(|| ApiError::Network("no window available".to_string()))?;

            let headers = web_sys::Headers::new().map_err(js_error)?;
            if let Some(auth) = auth {
                headers.set("Authorization", auth).map_err(js_error)?;
            }

            let init = web_sys::RequestInit::new();
            init.set_method(method.as_str());
            match payload {
                Payload::Empty => {}
                Payload::Json(body) => {
                    headers.set("Content-Type", "application/json").map_err(js_error)?;
                    init.set_body(&JsValue::from_str(&body));
                }
                Payload::Form(body) => {
                    headers
                        .set("Content-Type", "application/x-www-form-urlencoded")
                        .map_err(js_error)?;
                    init.set_body(&JsValue::from_str(&body));
                }
                // the browser writes the multipart boundary itself
                Payload::Multipart(form) => init.set_body(&form),
            }
            init.set_headers(&headers);

            let request = web_sys::Request::new_with_str_and_init(path, &init).map_err(js_error)?;
            let resp_value = JsFuture::from(window.fetch_with_request(&request))
                .await
                .map_err(js_error)?;
            let resp: web_sys::Response = resp_value.dyn_into().map_err(js_error)?;

            let text = JsFuture::from(resp.text().map_err(js_error)?)
                .await
                .map_err(js_error)?;
            log::debug!("{} {} -> {}", method.as_str(), path, resp.status());

            Ok((resp.status(), text.as_string().unwrap_or_default()))
        }
    } else {
        async fn transport(
            method: Method,
            path: &str,
            _payload: Payload,
            _auth: Option<&str>,
        ) -> Result<(u16, String), ApiError> {
            log::debug!("{} {} requested outside the browser", method.as_str(), path);
            Err(ApiError::Network("browser transport unavailable".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_decode_success_and_errors() {
        let status: ChainStatus = decode(200, r#"{"initialized": true}"#, true).unwrap();
        assert!(status.initialized);

        let err = decode::<ChainStatus>(400, r#"{"detail": "You can select a maximum of 3 files."}"#, true)
            .unwrap_err();
        assert_eq!(err.user_message(), "You can select a maximum of 3 files.");

        let err = decode::<ChainStatus>(200, "not json", true).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_unauthorized_only_with_credential() {
        let err = check_status(401, r#"{"detail": "Incorrect username or password"}"#, false).unwrap_err();
        assert_eq!(err.user_message(), "Incorrect username or password");

        let err = check_status(401, r#"{"detail": "Could not validate user."}"#, true).unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);

        assert!(check_status(204, "", true).is_ok());
    }

    #[test]
    fn test_logout_clears_credentials() {
        let store = MemoryStore::new();
        store.set(AUTH_TOKEN, "abc");
        store.set(storage::CHAT_SESSION_ID, "s1");
        let api = HttpApi::new(store.clone());
        assert!(api.is_signed_in());

        api.logout();
        assert!(!api.is_signed_in());
        assert!(store.is_empty());
    }

    #[test]
    fn test_endpoint_methods_and_paths() {
        let cases = [
            (Endpoint::Token, Method::Post, "/api/auth/token"),
            (Endpoint::CreateUser, Method::Post, "/api/auth/create_user"),
            (Endpoint::ResetPassword, Method::Put, "/api/auth/reset_password"),
            (Endpoint::ChainStatus, Method::Get, "/api/chain/status"),
            (Endpoint::InitializeChain, Method::Post, "/api/chain/initialize"),
            (Endpoint::Ask(AskMode::Hybrid), Method::Post, "/api/chain/ask_rag_agent"),
            (Endpoint::StartChat, Method::Post, "/api/chat/start"),
            (Endpoint::ChatMessage, Method::Post, "/api/chat/message"),
            (Endpoint::ChatHistory("s 1"), Method::Get, "/api/chat/history/s%201"),
            (Endpoint::EndChat("s1"), Method::Delete, "/api/chat/end/s1"),
            (Endpoint::ListFiles, Method::Get, "/api/files/list_all_uploaded_files"),
            (Endpoint::SelectFiles, Method::Post, "/api/files/select_files"),
            (Endpoint::UploadFiles, Method::Post, "/api/files/upload_files"),
            (Endpoint::DeleteFile(7), Method::Delete, "/api/files/7"),
        ];
        for (endpoint, method, path) in cases {
            assert_eq!(endpoint.method(), method, "{:?}", endpoint);
            assert_eq!(endpoint.path(), path);
        }
        assert_eq!(Endpoint::ResetPassword.method().as_str(), "PUT");
    }

    #[cfg(not(feature = "hydrate"))]
    #[tokio::test]
    async fn test_native_transport_reports_network_error() {
        let api = HttpApi::new(MemoryStore::new());
        let err = api.chain_status().await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
