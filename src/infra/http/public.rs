use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use crate::{
    application::{
        blog::{BlogError, BlogService},
        error::{ErrorReport, HttpError},
        repos::HealthRepo,
    },
    infra::{
        assets::{build_response, serve_static_asset},
        media::MediaStorage,
    },
    presentation::views::{
        ContactsTemplate, IndexTemplate, LayoutChrome, LayoutContext, PostTemplate,
        PostsListTemplate, YearArchiveTemplate, render_not_found_response,
        render_template_response,
    },
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub blog: Arc<BlogService>,
    pub media: Arc<MediaStorage>,
    pub health: Arc<dyn HealthRepo>,
}

pub fn build_router(state: HttpState) -> Router {
    let page_routes = Router::new()
        .route("/", get(index))
        .route("/page/{page}", get(index_page))
        .route("/post/{slug}", get(post_detail))
        .route("/tag/{tag}", get(tag_filter))
        .route("/year/{year}", get(year_archive))
        .route("/contacts", get(contacts))
        .route("/contacts/", get(contacts))
        .fallback(fallback);

    let file_routes = Router::new()
        .route("/_health/db", get(public_health))
        .route("/media/{*path}", get(serve_media))
        .route("/static/{*path}", get(serve_static_asset));

    page_routes
        .merge(file_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>) -> Response {
    render_index(&state, 1).await
}

async fn index_page(State(state): State<HttpState>, Path(page): Path<String>) -> Response {
    match page.parse::<u32>() {
        Ok(page) => render_index(&state, page).await,
        Err(_) => render_not_found_response(state.blog.chrome()),
    }
}

async fn render_index(state: &HttpState, page: u32) -> Response {
    let chrome = state.blog.chrome();
    match state.blog.index_context(page).await {
        Ok(content) => {
            let chrome = if page > 1 {
                chrome.with_page_title(&format!("Page {page}"))
            } else {
                chrome
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let chrome = state.blog.chrome();
    match state.blog.post_detail(&slug).await {
        Ok(Some(content)) => {
            let chrome = chrome.with_page_title(&content.post.title);
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn tag_filter(State(state): State<HttpState>, Path(tag): Path<String>) -> Response {
    let chrome = state.blog.chrome();
    match state.blog.tag_filter(&tag).await {
        Ok(Some(content)) => {
            let chrome = chrome.with_page_title(&format!("#{}", content.tag));
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostsListTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn year_archive(State(state): State<HttpState>, Path(year): Path<String>) -> Response {
    let chrome = state.blog.chrome();
    let Ok(year) = year.parse::<i32>() else {
        return render_not_found_response(chrome);
    };

    match state.blog.year_archive(year).await {
        Ok(Some(content)) => {
            let chrome = chrome.with_page_title(&year.to_string());
            let view = LayoutContext::new(chrome, content);
            render_template_response(YearArchiveTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome),
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn contacts(State(state): State<HttpState>) -> Response {
    let chrome = state.blog.chrome().with_page_title("Contacts");
    let view = LayoutContext::new(chrome, state.blog.contacts());
    render_template_response(ContactsTemplate { view }, StatusCode::OK)
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(state.blog.chrome())
}

fn blog_error_to_response(err: BlogError, chrome: LayoutChrome) -> Response {
    match err {
        BlogError::InvalidPage(page) => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_message(
                "infra::http::blog_error_to_response",
                StatusCode::NOT_FOUND,
                format!("page {page} is outside the listing"),
            )
            .attach(&mut response);
            response
        }
        other => HttpError::from(other).into_response(),
    }
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.media.read(&path).await {
        Ok(bytes) => build_response(
            bytes,
            mime_guess::from_path(&path).first_or_octet_stream(),
            "public, max-age=3600",
        ),
        Err(err) if err.is_missing() => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            format!("media file `{path}` is not available"),
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read media file"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read media file",
                &err,
            )
            .into_response()
        }
    }
}
