use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use metrics::counter;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    counter!("sensive_page_render_total", "status" => status.as_u16().to_string()).increment(1);
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

impl PageMetaView {
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }
}

/// Parts of the layout shared by every page.
#[derive(Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    pub navigation: Vec<NavigationLinkView>,
    pub footer_copy: String,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn with_page_title(self, page_title: &str) -> Self {
        let title = format!("{page_title} · {}", self.site_title);
        Self {
            meta: self.meta.with_title(title),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub navigation: Vec<NavigationLinkView>,
    pub footer_copy: String,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            navigation: chrome.navigation,
            footer_copy: chrome.footer_copy,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagSummary {
    pub title: String,
    pub url: String,
    pub posts_with_tag: u64,
}

#[derive(Clone, Debug)]
pub struct PostCard {
    pub title: String,
    pub teaser_text: String,
    pub author: String,
    pub comments_amount: u64,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
    pub slug: String,
    pub url: String,
    pub tags: Vec<TagSummary>,
    pub first_tag_title: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CommentView {
    pub text: String,
    pub published: String,
    pub iso_date: String,
    pub author: String,
}

#[derive(Clone, Debug)]
pub struct PostDetailView {
    pub title: String,
    pub text: String,
    pub author: String,
    pub comments: Vec<CommentView>,
    pub likes_amount: u64,
    pub image_url: Option<String>,
    pub published: String,
    pub iso_date: String,
    pub slug: String,
    pub tags: Vec<TagSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationView {
    pub page: u32,
    pub newer_href: Option<String>,
    pub older_href: Option<String>,
}

pub struct IndexContext {
    pub most_popular_posts: Vec<PostCard>,
    pub page_posts: Vec<PostCard>,
    pub popular_tags: Vec<TagSummary>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContext>,
}

pub struct PostDetailContext {
    pub post: PostDetailView,
    pub popular_tags: Vec<TagSummary>,
    pub most_popular_posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

pub struct TagFilterContext {
    pub tag: String,
    pub posts: Vec<PostCard>,
    pub popular_tags: Vec<TagSummary>,
    pub most_popular_posts: Vec<PostCard>,
}

#[derive(Template)]
#[template(path = "posts_list.html")]
pub struct PostsListTemplate {
    pub view: LayoutContext<TagFilterContext>,
}

pub struct YearArchiveContext {
    pub year: i32,
    pub posts: Vec<PostCard>,
    pub popular_tags: Vec<TagSummary>,
}

#[derive(Template)]
#[template(path = "year.html")]
pub struct YearArchiveTemplate {
    pub view: LayoutContext<YearArchiveContext>,
}

pub struct ContactsView {
    pub email: Option<String>,
}

#[derive(Template)]
#[template(path = "contacts.html")]
pub struct ContactsTemplate {
    pub view: LayoutContext<ContactsView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist. Try returning to the homepage to continue reading.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
