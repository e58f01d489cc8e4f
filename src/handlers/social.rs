use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::extract_viewer_id;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{CommentService, LikeService};

pub async fn like(
    req: HttpRequest,
    service: web::Data<LikeService>,
    body: web::Json<LikeRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    service.like(viewer.0, body.video_id).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn unlike(
    req: HttpRequest,
    service: web::Data<LikeService>,
    body: web::Json<LikeRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    service.unlike(viewer.0, body.video_id).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub async fn publish_comment(
    req: HttpRequest,
    service: web::Data<CommentService>,
    body: web::Json<PublishCommentRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    if viewer.is_anonymous() {
        return Err(AppError::Unauthorized);
    }
    // The authenticated username would normally come from the same context
    // that supplies viewer_id; account/profile lookup is out of scope, so the
    // viewer id is used as a placeholder display name here.
    let username = viewer.0.to_string();
    let comment = service
        .publish(viewer.0, &username, body.video_id, &body.content)
        .await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn delete_comment(
    req: HttpRequest,
    service: web::Data<CommentService>,
    body: web::Json<DeleteCommentRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    service.delete(viewer.0, body.comment_id).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/like").route(web::post().to(like)))
        .service(web::resource("/unlike").route(web::post().to(unlike)))
        .service(web::resource("/comment").route(web::post().to(publish_comment)))
        .service(web::resource("/comment/delete").route(web::post().to(delete_comment)));
}
