//! Request extractors
//!
//! Bearer-token authentication and role gates as typed extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::app::AppState;
use crate::error::AppError;
use crate::models::user::User;
use crate::services::audit_service::ClientInfo;

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub client: ClientInfo,
}

/// Admin or church pastor
#[derive(Debug, Clone)]
pub struct PastorUser(pub CurrentUser);

/// Admin only
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized)?;

        let user = state.auth.authenticate(bearer.token()).await?;
        let client = client_info(parts);
        Ok(CurrentUser { user, client })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for PastorUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_pastor_level() {
            return Err(AppError::forbidden("Pastor or admin access required"));
        }
        Ok(PastorUser(current))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_admin() {
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(AdminUser(current))
    }
}

/// Caller address for endpoints that run before authentication
#[derive(Debug, Clone)]
pub struct Client(pub ClientInfo);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Client(client_info(parts)))
    }
}

/// Caller address and agent. Proxy headers win over the socket address.
pub fn client_info(parts: &Parts) -> ClientInfo {
    let ip_address = forwarded_ip(&parts.headers).or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });
    let user_agent = parts
        .headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        ip_address,
        user_agent,
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_client_info_prefers_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header(USER_AGENT, "church-app/1.0")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let info = client_info(&parts);
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(info.user_agent.as_deref(), Some("church-app/1.0"));
    }

    #[test]
    fn test_client_info_without_headers() {
        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(client_info(&parts), ClientInfo::default());
    }
}
