use leptos::prelude::*;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

impl ToastKind {
    fn classes(&self) -> &'static str {
        match self {
            ToastKind::Success => "bg-seafoam-600 text-white",
            ToastKind::Error => "bg-salmon-600 text-white",
            ToastKind::Info => "bg-teal-600 text-white",
            ToastKind::Warning => "bg-yellow-500 text-gray-900",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
}

/// Page-wide notification queue, provided once by the app shell.
#[derive(Clone, Copy)]
pub struct ToastContext {
    toasts: RwSignal<Vec<Toast>>,
    next_id: StoredValue<u64>,
}

impl Default for ToastContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastContext {
    pub fn new() -> Self {
        Self {
            toasts: RwSignal::new(Vec::new()),
            next_id: StoredValue::new(0),
        }
    }

    pub fn show(&self, message: impl Into<String>, kind: ToastKind) {
        let id = self.next_id.get_value();
        self.next_id.set_value(id + 1);
        self.toasts.update(|toasts| {
            toasts.push(Toast {
                id,
                kind,
                message: message.into(),
            })
        });

        let this = *self;
        set_timeout(move || this.dismiss(id), Duration::from_secs(3));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Error);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Info);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Warning);
    }

    pub fn dismiss(&self, id: u64) {
        self.toasts.update(|toasts| toasts.retain(|t| t.id != id));
    }
}

pub fn use_toasts() -> ToastContext {
    use_context::<ToastContext>().unwrap_or_else(|| {
        log::warn!("ToastContext missing, toasts will not be shown");
        ToastContext::new()
    })
}

#[component]
pub fn ToastHost() -> impl IntoView {
    let ctx = use_toasts();

    view! {
        <div class="fixed top-4 right-4 z-50 flex flex-col space-y-2">
            <For
                each=move || ctx.toasts.get()
                key=|toast| toast.id
                children=move |toast| {
                    let id = toast.id;
                    view! {
                        <div
                            class=format!(
                                "px-4 py-3 rounded-md shadow-lg text-sm cursor-pointer {}",
                                toast.kind.classes(),
                            )
                            on:click=move |_| ctx.dismiss(id)
                        >
                            {toast.message}
                        </div>
                    }
                }
            />
        </div>
    }
}
