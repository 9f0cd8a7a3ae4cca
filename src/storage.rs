use cfg_if::cfg_if;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const AUTH_TOKEN: &str = "authToken";
pub const TOKEN_TYPE: &str = "tokenType";
pub const USERNAME: &str = "username";
pub const LAST_QUERY: &str = "lastQuery";
pub const RAG_INITIALIZED: &str = "ragInitialized";
pub const CHAT_SESSION_ID: &str = "chatSessionId";

const ALL_KEYS: [&str; 6] = [
    AUTH_TOKEN,
    TOKEN_TYPE,
    USERNAME,
    LAST_QUERY,
    RAG_INITIALIZED,
    CHAT_SESSION_ID,
];

/// Client-side key/value persistence. Writes are best-effort.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

fn warn_on_failure<E: std::fmt::Debug>(action: &str, key: &str, result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to {} {}: {:?}", action, key, e);
            false
        }
    }
}

/// `window.localStorage`. Outside the browser every read misses and writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

cfg_if! {
    if #[cfg(feature = "hydrate")] {
        fn local_storage() -> Option<web_sys::Storage> {
            web_sys::window().and_then(|w| w.local_storage().ok().flatten())
        }

        impl KeyValueStore for BrowserStorage {
            fn get(&self, key: &str) -> Option<String> {
                local_storage().and_then(|s| s.get_item(key).ok().flatten())
            }

            fn set(&self, key: &str, value: &str) {
                if let Some(storage) = local_storage() {
                    warn_on_failure("persist", key, storage.set_item(key, value));
                }
            }

            fn remove(&self, key: &str) {
                if let Some(storage) = local_storage() {
                    warn_on_failure("remove", key, storage.remove_item(key));
                }
            }
        }
    } else {
        impl KeyValueStore for BrowserStorage {
            fn get(&self, _key: &str) -> Option<String> {
                None
            }

            fn set(&self, _key: &str, _value: &str) {}

            fn remove(&self, _key: &str) {}
        }
    }
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

/// `Authorization` header value from the stored token, `Bearer` unless a type was stored.
pub fn authorization(store: &impl KeyValueStore) -> Option<String> {
    let token = store.get(AUTH_TOKEN).filter(|t| !t.is_empty())?;
    let token_type = store
        .get(TOKEN_TYPE)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Bearer".to_string());
    Some(format!("{} {}", capitalize(&token_type), token))
}

pub fn username(store: &impl KeyValueStore) -> String {
    store.get(USERNAME).unwrap_or_else(|| "User".to_string())
}

pub fn rag_initialized(store: &impl KeyValueStore) -> Option<bool> {
    store.get(RAG_INITIALIZED).and_then(|v| v.parse().ok())
}

/// Logout wipes everything the client keeps.
pub fn clear_all(store: &impl KeyValueStore) {
    for key in ALL_KEYS {
        store.remove(key);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
