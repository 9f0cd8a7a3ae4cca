use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "ssr")] {
        use axum::{routing::any, Router};
        use dotenv::dotenv;
        use env_logger::Env;
        use leptos::prelude::*;
        use leptos_axum::{generate_route_list, LeptosRoutes};
        use tower_http::trace::TraceLayer;
        use ragdesk::app::*;
        use ragdesk::config::ServerConfig;
        use ragdesk::handlers::{proxy_handler, ProxyState};
        use ragdesk::state::AppState;

        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            dotenv().ok();
            env_logger::init_from_env(Env::default().default_filter_or("info"));

            let config = ServerConfig::from_env()?;
            let conf = get_configuration(None)?;
            let mut leptos_options = conf.leptos_options;
            if let Some(port) = config.port {
                leptos_options.site_addr.set_port(port);
            }
            let addr = leptos_options.site_addr;
            let routes = generate_route_list(App);

            log::info!("Forwarding /api to {}", config.backend_url);
            let app_state = AppState {
                leptos_options: leptos_options.clone(),
                proxy: ProxyState::new(&config)?,
            };

            let app = Router::new()
                .route("/api/*path", any(proxy_handler))
                .leptos_routes(&app_state, routes, {
                    let leptos_options = leptos_options.clone();
                    move || shell(leptos_options.clone())
                })
                .fallback(leptos_axum::file_and_error_handler::<AppState, _>(shell))
                .layer(TraceLayer::new_for_http())
                .with_state(app_state);

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            log::info!("listening on http://{}", &addr);
            axum::serve(listener, app.into_make_service()).await?;
            Ok(())
        }
    } else {
        pub fn main() {
            // hydration entry point lives in lib.rs
        }
    }
}
