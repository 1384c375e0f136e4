use actix_web::{error, web, HttpResponse, Result};

use coviewer_system::RoomId;

use crate::server::ServerTx;

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(web::resource("/rooms").route(web::get().to(list_rooms)))
            .service(web::resource("/rooms/{room_id}").route(web::get().to(show_room))),
    );
}

async fn list_rooms(srv_tx: web::Data<ServerTx>) -> Result<HttpResponse> {
    let rooms = srv_tx
        .list_rooms()
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(rooms))
}

async fn show_room(
    room_id: web::Path<String>,
    srv_tx: web::Data<ServerTx>,
) -> Result<HttpResponse> {
    let room_id = RoomId::from(room_id.into_inner());
    let snapshot = srv_tx
        .room_snapshot(&room_id)
        .await
        .map_err(error::ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(snapshot))
}
