// File: services/docbridge_backend/src/main.rs
use axum::{routing::get, Router};
use docbridge_axum::{register, routes as db_routes, PluginOptions};
use docbridge_common::logging::{self, log_error, log_result};
use docbridge_config::load_config;
use docbridge_db::MongoDriver;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

mod posts;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if cfg!(debug_assertions) {
        logging::init_with_level(Level::DEBUG);
    } else {
        logging::init();
    }

    let config = log_result(
        load_config(),
        "Configuration loaded",
        "Failed to load configuration",
    )?;
    let Some(database) = config.database.as_ref() else {
        return Err("missing [database] section in configuration".into());
    };

    // 1. Connect and bind the models
    let options = PluginOptions::from_config(database)
        .with_schema(posts::POST_MODEL, posts::post_schema());
    let exposed = log_result(
        register(MongoDriver::new(), options).await,
        "Database ready, models bound",
        "Database registration failed",
    )?;
    let handle = exposed.handle();

    if let Ok(model) = exposed.connector.get_model(posts::POST_MODEL) {
        if let Err(err) = model.sync_indexes().await {
            log_error(err, "Could not create post indexes");
        }
    }

    // 2. Routes
    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to the docbridge API!" }))
        .route(
            "/posts",
            get(posts::recent_posts_handler).post(posts::create_post_handler),
        )
        .merge(db_routes(handle.clone()));
    let api_router = exposed.attach(api_router);

    #[allow(unused_mut)] // mutable for the openapi feature
    let mut app = Router::new().nest("/api", api_router);

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use docbridge_axum::DbApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "docbridge API",
                version = "0.1.0",
                description = "docbridge service API docs"
            ),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(DbApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        let swagger_ui = SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc);
        app = app.merge(swagger_ui);
    }

    let app = app.layer(TraceLayer::new_for_http());

    // 3. Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handle.close().await?;
    info!("Database connection closed, bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log_error(err, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
