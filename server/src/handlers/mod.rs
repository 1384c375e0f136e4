use crate::connection::ws_index;
use crate::handlers::admin::configure_admin_handlers;
use crate::handlers::documents::configure_document_handlers;
use actix_web::web;

mod admin;
mod documents;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/{room_id}").route(web::get().to(ws_index)));

    configure_document_handlers(cfg);
    configure_admin_handlers(cfg);
}
