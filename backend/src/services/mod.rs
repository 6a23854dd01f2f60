pub mod companies;
pub mod imports;
pub mod owner;

use actix_web::web;

/// Register every API scope. Shared by `main` and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(imports::configure_routes())
        .service(companies::configure_routes());
}
