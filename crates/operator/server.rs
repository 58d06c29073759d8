use actix_web::{dev::Server, middleware, web::Data, App, HttpServer};
use anyhow::Result;
use cdtarget::controllers::cdtarget_controller::State;

use crate::handlers::{health, metrics};

/// Configure the HTTP server exposing health, diagnostics and metrics
pub fn server(state: State, bind_address: &str) -> Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(health::index)
            .service(health::health)
            .service(metrics::metrics)
    })
    .bind(bind_address)?
    .shutdown_timeout(5);

    Ok(server.run())
}
