//! `GET /api/companies/{year}`: the owner's companies with their share
//! totals as of the last completed import.

use crate::error::ImportError;
use crate::pipeline::Pipeline;
use crate::services::owner::OwnerId;
use crate::store::aggregate;
use actix_web::{web, HttpResponse};

const API_PATH: &str = "/api/companies";

pub fn configure_routes() -> actix_web::Scope {
    web::scope(API_PATH).route("/{year}", web::get().to(process))
}

async fn process(
    owner: OwnerId,
    year: web::Path<i32>,
    pipeline: web::Data<Pipeline>,
) -> Result<HttpResponse, ImportError> {
    let year = year.into_inner();
    let pipeline = pipeline.get_ref().clone();
    let companies = web::block(move || {
        pipeline
            .db()
            .with_conn(|conn| aggregate::company_totals(conn, year, owner.as_str()))
    })
    .await??;
    Ok(HttpResponse::Ok().json(companies))
}
