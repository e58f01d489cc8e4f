use actix_web::{web, HttpRequest, HttpResponse};

use crate::auth::extract_viewer_id;
use crate::error::AppResult;
use crate::models::*;
use crate::services::FeedService;

pub async fn latest(
    req: HttpRequest,
    service: web::Data<FeedService>,
    body: web::Json<LatestFeedRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    let response = service.list_latest(viewer.0, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn likes_count(
    req: HttpRequest,
    service: web::Data<FeedService>,
    body: web::Json<LikesCountFeedRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    let response = service.list_by_likes_count(viewer.0, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn following(
    req: HttpRequest,
    service: web::Data<FeedService>,
    body: web::Json<FollowingFeedRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    let response = service.list_following(viewer.0, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn popularity(
    req: HttpRequest,
    service: web::Data<FeedService>,
    body: web::Json<PopularityFeedRequest>,
) -> AppResult<HttpResponse> {
    let viewer = extract_viewer_id(&req);
    let response = service.list_popularity(viewer.0, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/feed/latest").route(web::post().to(latest)))
        .service(web::resource("/feed/likesCount").route(web::post().to(likes_count)))
        .service(web::resource("/feed/following").route(web::post().to(following)))
        .service(web::resource("/feed/popularity").route(web::post().to(popularity)));
}
