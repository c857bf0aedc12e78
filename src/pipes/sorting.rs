//! The `sorting` inbound pipe.

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::context::RouteContext;
use crate::pipeline::pipe::PipeIn;
use crate::pipeline::stage::Flow;
use crate::pipes::paginate::pairs;
use crate::port::PortView;
use crate::validate::rules::split_list;
use crate::BoxError;

/// Reads `__sort` (`field:name,order:desc`), `__sort_field` and
/// `__sort_order`, and stashes `{field, order}`.
///
/// The field must be listed in `PIPEIN(sorting={ALLOW="a,b"})`, either by
/// name or through one of the property's COMPATIBLE aliases; otherwise the
/// request fails with 400 INVALID_SORTING_FIELD.
pub struct Sorting;

impl Sorting {
    pub const NAME: &'static str = "sorting";
}

impl PipeIn for Sorting {
    fn pipe_in(
        &self,
        request: &Request,
        response: &mut Response,
        route: &mut RouteContext,
        port: &mut PortView,
    ) -> Result<Flow<()>, BoxError> {
        let mut field: Option<String> = None;
        let mut order: Option<String> = None;

        if let Some(spec) = request.value("__sort").and_then(Value::as_str) {
            for (key, value) in pairs(spec) {
                match key {
                    "field" => field = Some(value.to_string()),
                    "order" => order = Some(value.to_string()),
                    _ => {}
                }
            }
        }
        if let Some(value) = request.value("__sort_field").and_then(Value::as_str) {
            field = Some(value.to_string());
        }
        if let Some(value) = request.value("__sort_order").and_then(Value::as_str) {
            order = Some(value.to_string());
        }
        let order = order
            .map(|o| o.to_ascii_lowercase())
            .filter(|o| o == "asc" || o == "desc");

        let field = match field.filter(|f| !f.is_empty()) {
            None => None,
            Some(requested) => {
                let allow = port
                    .extra_param("PIPEIN", Self::NAME)
                    .and_then(|params| params.get("ALLOW").or_else(|| params.get("allow")))
                    .and_then(Value::as_str)
                    .map(|a| split_list(a, ','))
                    .unwrap_or_default();
                let resolved = allow.iter().find_map(|property| {
                    if *property == requested {
                        return Some(property.clone());
                    }
                    let compatibles = route
                        .property(property)
                        .and_then(|meta| meta.doc.text("COMPATIBLE"))
                        .map(|c| split_list(c, ','))
                        .unwrap_or_default();
                    compatibles.contains(&requested).then(|| property.clone())
                });
                match resolved {
                    Some(property) => Some(property),
                    None => {
                        response.fail(
                            StatusCode::BAD_REQUEST,
                            "INVALID_SORTING_FIELD",
                            json!({"field": requested, "allow": allow}),
                        );
                        return Ok(Flow::Respond);
                    }
                }
            }
        };

        route.stash(Self::NAME, json!({"field": field, "order": order}));
        Ok(Flow::Next(()))
    }
}
