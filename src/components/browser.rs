use cfg_if::cfg_if;
use leptos::prelude::*;
use leptos_router::hooks::use_navigate;

use crate::api::HttpApi;

/// Send signed-out visitors to the login page.
pub fn use_auth_guard() {
    let navigate = use_navigate();
    Effect::new(move |_| {
        if !<HttpApi>::default().is_signed_in() {
            log::info!("No credential stored, redirecting to login");
            navigate("/login", Default::default());
        }
    });
}

pub fn confirm(message: &str) -> bool {
    cfg_if! {
        if #[cfg(feature = "hydrate")] {
            web_sys::window()
                .and_then(|w| w.confirm_with_message(message).ok())
                .unwrap_or(false)
        } else {
            let _ = message;
            false
        }
    }
}

/// Hand `content` to the browser as a file download.
pub fn download_text(filename: &str, content: &str, mime: &str) -> Result<(), String> {
    cfg_if! {
        if #[cfg(feature = "hydrate")] {
            use wasm_bindgen::{JsCast, JsValue};

            let js = |e: JsValue| format!("{:?}", e);
            let document = web_sys::window()
                .and_then(|w| w.document())
                .ok_or_else(|| "no document".to_string())?;

            let parts = js_sys::Array::of1(&JsValue::from_str(content));
            let options = web_sys::BlobPropertyBag::new();
            options.set_type(mime);
            let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options).map_err(js)?;
            let url = web_sys::Url::create_object_url_with_blob(&blob).map_err(js)?;

            let anchor: web_sys::HtmlAnchorElement = document
                .create_element("a")
                .map_err(js)?
                .dyn_into()
                .map_err(|_| "not an anchor".to_string())?;
            anchor.set_href(&url);
            anchor.set_download(filename);
            anchor.click();

            web_sys::Url::revoke_object_url(&url).map_err(js)?;
            Ok(())
        } else {
            let _ = (content, mime);
            Err(format!("cannot download {} outside the browser", filename))
        }
    }
}

/// Resolve after `duration` using the browser's timer.
pub async fn sleep(duration: std::time::Duration) {
    cfg_if! {
        if #[cfg(feature = "hydrate")] {
            let millis = duration.as_millis().min(i32::MAX as u128) as i32;
            let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                let scheduled = web_sys::window()
                    .ok_or_else(|| wasm_bindgen::JsValue::from_str("no window"))
                    .and_then(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis));
                resolve_unscheduled(scheduled, || {
                    let _ = resolve.call0(&wasm_bindgen::JsValue::UNDEFINED);
                });
            });
            let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
        } else {
            let _ = duration;
        }
    }
}

// a timer that never got scheduled would leave its promise pending forever
fn resolve_unscheduled<T, E: std::fmt::Debug>(scheduled: Result<T, E>, resolve: impl FnOnce()) {
    if let Err(e) = scheduled {
        log::warn!("Could not schedule a timer, resolving now: {:?}", e);
        resolve();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_unscheduled_timer_resolves_immediately() {
        let resolved = Cell::new(false);
        resolve_unscheduled(Err::<i32, _>("no window"), || resolved.set(true));
        assert!(resolved.get());

        let resolved = Cell::new(false);
        resolve_unscheduled(Ok::<i32, &str>(7), || resolved.set(true));
        assert!(!resolved.get());
    }
}
