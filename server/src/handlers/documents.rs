use std::fmt;
use std::pin::pin;

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::web::{self, Bytes, BytesMut};
use actix_web::{error, HttpRequest, HttpResponse, Result};
use futures_util::{Stream, StreamExt as _};
use serde_json::json;

use coviewer_system::RoomId;

use crate::document_file::DocumentFiles;

/// Form field carrying the document in a `multipart/form-data` upload.
const FILE_FIELD: &str = "file";

pub fn configure_document_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/upload/{room_id}").route(web::post().to(upload)))
        .service(web::resource("/documents/{room_id}").route(web::get().to(download)));
}

/// Accepts a `multipart/form-data` form with a `file` field, or the document
/// as the raw request body for any other content type.
async fn upload(
    req: HttpRequest,
    payload: web::Payload,
    room_id: web::Path<String>,
    documents: web::Data<DocumentFiles>,
) -> Result<HttpResponse> {
    let room_id = RoomId::from(room_id.into_inner());
    let limit = documents.max_bytes();
    let blob = if is_multipart(&req) {
        read_file_field(Multipart::new(req.headers(), payload), limit).await?
    } else {
        read_limited(payload, limit).await?
    };

    match documents.store(&room_id, &blob).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "message": "Document uploaded successfully" }))),
        Err(err) => {
            log::error!("{}", err);
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "message": format!("Error uploading document: {}", err) })))
        }
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| value.starts_with("multipart/form-data"))
}

async fn read_file_field(mut multipart: Multipart, limit: usize) -> Result<Bytes> {
    while let Some(field) = multipart.next().await {
        let field = field.map_err(error::ErrorBadRequest)?;
        if field.name() == Some(FILE_FIELD) {
            return read_limited(field, limit).await;
        }
        log::debug!("Skipping upload field {:?}", field.name());
    }
    Err(error::ErrorBadRequest("missing `file` field"))
}

async fn read_limited<S, E>(stream: S, limit: usize) -> Result<Bytes>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: fmt::Debug + fmt::Display + 'static,
{
    let mut stream = pin!(stream);
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(error::ErrorBadRequest)?;
        if body.len() + chunk.len() > limit {
            return Err(error::ErrorPayloadTooLarge("document too large"));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

async fn download(
    room_id: web::Path<String>,
    documents: web::Data<DocumentFiles>,
) -> Result<HttpResponse> {
    let room_id = RoomId::from(room_id.into_inner());
    let blob = documents
        .retrieve(&room_id)
        .await
        .map_err(error::ErrorInternalServerError)?
        .ok_or_else(|| error::ErrorNotFound("no document for this room"))?;

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(blob))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    const BOUNDARY: &str = "XcoviewerX";

    fn multipart_body(fields: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, content) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"slides.pdf\"\r\n\
                 Content-Type: application/pdf\r\n\r\n{}\r\n",
                BOUNDARY, name, content
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    fn multipart_upload(uri: &str, body: String) -> test::TestRequest {
        test::TestRequest::post()
            .uri(uri)
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn it_serves_uploaded_document() {
        let dir = tempfile::tempdir().expect("");
        let documents = DocumentFiles::open(dir.path()).await.expect("");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(documents))
                .configure(configure_document_handlers),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/upload/R1")
            .set_payload("%PDF-1.7 slides")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/documents/R1").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, Bytes::from_static(b"%PDF-1.7 slides"));
    }

    #[actix_web::test]
    async fn it_reports_missing_document() {
        let dir = tempfile::tempdir().expect("");
        let documents = DocumentFiles::open(dir.path()).await.expect("");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(documents))
                .configure(configure_document_handlers),
        )
        .await;

        let req = test::TestRequest::get().uri("/documents/empty").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn it_stores_only_the_file_field_of_a_form_upload() {
        let dir = tempfile::tempdir().expect("");
        let documents = DocumentFiles::open(dir.path()).await.expect("");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(documents))
                .configure(configure_document_handlers),
        )
        .await;

        let body = multipart_body(&[("title", "Quarterly"), ("file", "%PDF-1.7 slides")]);
        let resp = test::call_service(&app, multipart_upload("/upload/R1", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/documents/R1").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, Bytes::from_static(b"%PDF-1.7 slides"));
    }

    #[actix_web::test]
    async fn it_rejects_form_upload_without_file_field() {
        let dir = tempfile::tempdir().expect("");
        let documents = DocumentFiles::open(dir.path()).await.expect("");
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(documents))
                .configure(configure_document_handlers),
        )
        .await;

        let body = multipart_body(&[("title", "Quarterly")]);
        let resp = test::call_service(&app, multipart_upload("/upload/R1", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/documents/R1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn it_refuses_documents_over_the_limit() {
        let dir = tempfile::tempdir().expect("");
        let documents = DocumentFiles::open(dir.path())
            .await
            .expect("")
            .with_max_bytes(8);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(documents))
                .configure(configure_document_handlers),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/upload/R1")
            .set_payload("%PDF-1.7 slides")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
