//! llama.cpp server introspection endpoints.

use std::io;

use http::StatusCode;
use serde::Serialize;
use tokio::io::AsyncWrite;

use crate::state::GatewayState;
use crate::wire;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct GenerationSettings<'a> {
    n_ctx: u32,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct PropsResponse<'a> {
    default_generation_settings: GenerationSettings<'a>,
    total_slots: u32,
    n_ctx: u32,
    model_path: String,
    is_processing: bool,
}

#[derive(Debug, Serialize)]
struct SlotInfo {
    id: u32,
    n_ctx: u32,
    is_processing: bool,
}

/// `GET /health`: always `200`; the body says whether a model is loaded.
pub async fn health<W>(state: &GatewayState, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let status = if state.is_loaded() { "ok" } else { "no model loaded" };
    wire::write_json(out, StatusCode::OK, &HealthResponse { status }).await
}

/// `GET /props`
pub async fn props<W>(state: &GatewayState, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = PropsResponse {
        default_generation_settings: GenerationSettings {
            n_ctx: state.context_size(),
            model: state.model_name(),
        },
        total_slots: 1,
        n_ctx: state.context_size(),
        model_path: state
            .model()
            .map(|m| m.path.display().to_string())
            .unwrap_or_default(),
        is_processing: state.is_generating(),
    };
    wire::write_json(out, StatusCode::OK, &response).await
}

/// `GET /slots`: the single slot the engine has.
pub async fn slots<W>(state: &GatewayState, out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let slots = [SlotInfo {
        id: 0,
        n_ctx: state.context_size(),
        is_processing: state.is_generating(),
    }];
    wire::write_json(out, StatusCode::OK, &slots).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn body(response: &[u8]) -> Value {
        let text = std::str::from_utf8(response).unwrap();
        let (_, body) = text.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_health_without_model() {
        let mut out = Vec::new();

        health(&GatewayState::default(), &mut out).await.unwrap();

        assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert_eq!(body(&out), json!({"status": "no model loaded"}));
    }

    #[tokio::test]
    async fn test_slots_reflect_busy_flag() {
        let state = GatewayState::empty(2048);
        let _slot = state.try_begin_generation().unwrap();
        let mut out = Vec::new();

        slots(&state, &mut out).await.unwrap();

        assert_eq!(body(&out), json!([{"id": 0, "n_ctx": 2048, "is_processing": true}]));
    }

    #[tokio::test]
    async fn test_props_report_context_and_slots() {
        let state = GatewayState::empty(1024);
        let mut out = Vec::new();

        props(&state, &mut out).await.unwrap();

        let props = body(&out);
        assert_eq!(props["total_slots"], 1);
        assert_eq!(props["n_ctx"], 1024);
        assert_eq!(props["default_generation_settings"]["n_ctx"], 1024);
        assert_eq!(props["is_processing"], false);
    }
}
