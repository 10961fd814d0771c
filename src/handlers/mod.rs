//! API handlers for the booking server

mod admin;
mod booking;
mod payment;

pub use admin::*;
pub use booking::*;
pub use payment::*;

pub use crate::middleware::auth::{AdminUser, AuthenticatedUser};

use validator::Validate;

use crate::booking::PageRequest;
use crate::error::ApiError;
use crate::models::PaginationParams;

/// Validate list query parameters and resolve them into a page window
fn page_request(params: &PaginationParams, default_page_size: u32) -> Result<PageRequest, ApiError> {
    params.validate()?;
    let page = PageRequest::new(params.page, params.page_size, default_page_size)
        .with_order(params.order_by.as_deref())?;
    Ok(page)
}
