use leptos::{prelude::*, task::spawn_local};
use leptos_router::hooks::{use_navigate, use_query_map};
use std::time::Duration;

use crate::api::types::{CreateUserRequest, ResetPasswordRequest};
use crate::api::HttpApi;
use crate::components::toast::use_toasts;

const MIN_USERNAME: usize = 3;
const MIN_PASSWORD: usize = 6;

pub fn validate_username(value: &str) -> Result<(), &'static str> {
    if value.trim().chars().count() >= MIN_USERNAME {
        Ok(())
    } else {
        Err("Username must be at least 3 characters long")
    }
}

pub fn validate_email(value: &str) -> Result<(), &'static str> {
    let value = value.trim();
    let valid = !value.chars().any(char::is_whitespace)
        && value.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        });
    if valid {
        Ok(())
    } else {
        Err("Please enter a valid email address")
    }
}

pub fn validate_password(value: &str) -> Result<(), &'static str> {
    if value.trim().chars().count() >= MIN_PASSWORD {
        Ok(())
    } else {
        Err("Password must be at least 6 characters long")
    }
}

fn field_class(error: Option<&'static str>) -> &'static str {
    if error.is_some() {
        "w-full p-2 rounded-md border border-salmon-500 bg-white dark:bg-teal-700 text-gray-800 dark:text-gray-200"
    } else {
        "w-full p-2 rounded-md border border-gray-300 dark:border-teal-600 bg-white dark:bg-teal-700 text-gray-800 dark:text-gray-200"
    }
}

// only complain once the user has typed something
fn live_error(value: &str, check: fn(&str) -> Result<(), &'static str>) -> Option<&'static str> {
    if value.is_empty() {
        None
    } else {
        check(value).err()
    }
}

#[component]
fn AuthCard(title: &'static str, children: Children) -> impl IntoView {
    view! {
        <div class="min-h-screen flex items-center justify-center bg-gray-100 dark:bg-teal-900 p-4">
            <div class="w-full max-w-md bg-white dark:bg-teal-800 rounded-lg shadow-lg p-6">
                <h1 class="text-2xl font-bold text-gray-800 dark:text-gray-200 mb-6 text-center">
                    {title}
                </h1>
                {children()}
            </div>
        </div>
    }
}

#[component]
pub fn LoginPage() -> impl IntoView {
    let toasts = use_toasts();
    let navigate = use_navigate();
    let query = use_query_map();
    let (username, set_username) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (submitting, set_submitting) = signal(false);

    Effect::new(move |_| {
        if query.get().get("message").as_deref() == Some("logout") {
            toasts.success("Logged out successfully!");
        }
    });

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let user = username.get().trim().to_string();
        let pass = password.get();
        if validate_username(&user).is_err() || validate_password(&pass).is_err() {
            toasts.error("Please fill in all fields correctly");
            return;
        }

        set_submitting(true);
        toasts.info("Signing you in...");
        let navigate = navigate.clone();
        spawn_local(async move {
            match <HttpApi>::default().login(&user, &pass).await {
                Ok(_) => {
                    toasts.success("Login successful! Redirecting...");
                    set_timeout(
                        move || navigate("/dashboard", Default::default()),
                        Duration::from_millis(1500),
                    );
                }
                Err(e) => {
                    log::error!("Login failed: {}", e);
                    toasts.error(e.user_message());
                    set_submitting(false);
                }
            }
        });
    };

    view! {
        <AuthCard title="Sign in">
            <form class="space-y-4" on:submit=on_submit>
                <div>
                    <input
                        class=move || field_class(live_error(&username.get(), validate_username))
                        type="text"
                        name="username"
                        placeholder="Username"
                        prop:value=username
                        on:input=move |ev| set_username(event_target_value(&ev))
                    />
                    <FieldError error=Signal::derive(move || live_error(&username.get(), validate_username)) />
                </div>
                <div>
                    <input
                        class=move || field_class(live_error(&password.get(), validate_password))
                        type="password"
                        name="password"
                        placeholder="Password"
                        prop:value=password
                        on:input=move |ev| set_password(event_target_value(&ev))
                    />
                    <FieldError error=Signal::derive(move || live_error(&password.get(), validate_password)) />
                </div>
                <SubmitButton label="Sign in" busy=submitting />
            </form>
            <div class="mt-4 flex justify-between text-sm">
                <a href="/register" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"Create account"</a>
                <a href="/forgot-password" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"Forgot password?"</a>
            </div>
        </AuthCard>
    }
}

#[component]
pub fn RegisterPage() -> impl IntoView {
    let toasts = use_toasts();
    let navigate = use_navigate();
    let (username, set_username) = signal(String::new());
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (submitting, set_submitting) = signal(false);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let request = CreateUserRequest {
            username: username.get().trim().to_string(),
            email: email.get().trim().to_string(),
            password: password.get(),
        };
        if validate_username(&request.username).is_err()
            || validate_email(&request.email).is_err()
            || validate_password(&request.password).is_err()
        {
            toasts.error("Please fill in all fields correctly");
            return;
        }

        set_submitting(true);
        toasts.info("Creating your account...");
        let navigate = navigate.clone();
        spawn_local(async move {
            let api = <HttpApi>::default();
            match api.register(&request).await {
                Ok(_) => {
                    // sign straight in so the dashboard has a credential
                    if let Err(e) = api.login(&request.username, &request.password).await {
                        log::warn!("Account created but automatic sign-in failed: {}", e);
                    }
                    toasts.success("Account created successfully! Redirecting to dashboard...");
                    set_timeout(
                        move || navigate("/dashboard", Default::default()),
                        Duration::from_millis(1500),
                    );
                }
                Err(e) => {
                    log::error!("Registration failed: {}", e);
                    toasts.error(e.user_message());
                    set_submitting(false);
                }
            }
        });
    };

    view! {
        <AuthCard title="Create account">
            <form class="space-y-4" on:submit=on_submit>
                <div>
                    <input
                        class=move || field_class(live_error(&username.get(), validate_username))
                        type="text"
                        placeholder="Username"
                        prop:value=username
                        on:input=move |ev| set_username(event_target_value(&ev))
                    />
                    <FieldError error=Signal::derive(move || live_error(&username.get(), validate_username)) />
                </div>
                <div>
                    <input
                        class=move || field_class(live_error(&email.get(), validate_email))
                        type="email"
                        placeholder="Email"
                        prop:value=email
                        on:input=move |ev| set_email(event_target_value(&ev))
                    />
                    <FieldError error=Signal::derive(move || live_error(&email.get(), validate_email)) />
                </div>
                <div>
                    <input
                        class=move || field_class(live_error(&password.get(), validate_password))
                        type="password"
                        placeholder="Password"
                        prop:value=password
                        on:input=move |ev| set_password(event_target_value(&ev))
                    />
                    <FieldError error=Signal::derive(move || live_error(&password.get(), validate_password)) />
                </div>
                <SubmitButton label="Create account" busy=submitting />
            </form>
            <div class="mt-4 text-sm text-center">
                <a href="/login" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"Already have an account? Sign in"</a>
            </div>
        </AuthCard>
    }
}

#[component]
pub fn ForgotPasswordPage() -> impl IntoView {
    let toasts = use_toasts();
    let navigate = use_navigate();
    let (username, set_username) = signal(String::new());
    let (new_password, set_new_password) = signal(String::new());
    let (submitting, set_submitting) = signal(false);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let request = ResetPasswordRequest {
            username: username.get().trim().to_string(),
            new_password: new_password.get(),
        };
        if validate_username(&request.username).is_err()
            || validate_password(&request.new_password).is_err()
        {
            toasts.error("Please fill in all fields correctly");
            return;
        }

        set_submitting(true);
        toasts.info("Updating your password...");
        let navigate = navigate.clone();
        spawn_local(async move {
            match <HttpApi>::default().reset_password(&request).await {
                Ok(_) => {
                    toasts.success("Password updated successfully! Redirecting to login...");
                    set_timeout(
                        move || navigate("/login", Default::default()),
                        Duration::from_millis(1500),
                    );
                }
                Err(e) => {
                    log::error!("Password reset failed: {}", e);
                    toasts.error(e.user_message());
                    set_submitting(false);
                }
            }
        });
    };

    view! {
        <AuthCard title="Reset password">
            <form class="space-y-4" on:submit=on_submit>
                <div>
                    <input
                        class=move || field_class(live_error(&username.get(), validate_username))
                        type="text"
                        placeholder="Username"
                        prop:value=username
                        on:input=move |ev| set_username(event_target_value(&ev))
                    />
                </div>
                <div>
                    <input
                        class=move || field_class(live_error(&new_password.get(), validate_password))
                        type="password"
                        placeholder="New password"
                        prop:value=new_password
                        on:input=move |ev| set_new_password(event_target_value(&ev))
                    />
                    <FieldError error=Signal::derive(move || live_error(&new_password.get(), validate_password)) />
                </div>
                <SubmitButton label="Update password" busy=submitting />
            </form>
            <div class="mt-4 text-sm text-center">
                <a href="/login" class="text-seafoam-600 dark:text-aqua-400 hover:underline">"Back to sign in"</a>
            </div>
        </AuthCard>
    }
}

#[component]
fn FieldError(error: Signal<Option<&'static str>>) -> impl IntoView {
    move || {
        error
            .get()
            .map(|message| view! { <p class="text-xs text-salmon-600 mt-1">{message}</p> })
    }
}

#[component]
fn SubmitButton(label: &'static str, busy: ReadSignal<bool>) -> impl IntoView {
    view! {
        <button
            type="submit"
            class="w-full py-2 bg-seafoam-600 hover:bg-seafoam-700 text-white rounded-md transition-colors disabled:bg-gray-400 disabled:cursor-not-allowed"
            prop:disabled=busy
        >
            {move || if busy.get() { "Please wait..." } else { label }}
        </button>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("  ab  ").is_err());
        assert!(validate_username("abc").is_ok());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a b@c.d").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a@@b.co").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert_eq!(live_error("", validate_password), None);
        assert!(live_error("123", validate_password).is_some());
    }
}
