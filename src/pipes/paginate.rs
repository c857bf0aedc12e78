//! The `paginate` inbound pipe.

use serde_json::{json, Value};

use crate::config::PaginateConfig;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::context::RouteContext;
use crate::pipeline::pipe::PipeIn;
use crate::pipeline::stage::Flow;
use crate::port::PortView;
use crate::BoxError;

/// Reads `__paginate` (`page:2,size:20`), `__paginate_page` and
/// `__paginate_size`, clamps them and stashes `{page, size}`.
///
/// The port may lower or raise the size cap with `PIPEIN(paginate={MAX=..})`.
pub struct Paginate {
    config: PaginateConfig,
}

impl Paginate {
    pub const NAME: &'static str = "paginate";

    pub fn new(config: PaginateConfig) -> Self {
        Self { config }
    }

    fn max_size(&self, port: &PortView) -> i64 {
        port.extra_param("PIPEIN", Self::NAME)
            .and_then(|params| params.get("MAX").or_else(|| params.get("max")))
            .and_then(as_int)
            .filter(|max| *max > 0)
            .unwrap_or(self.config.max_size as i64)
    }
}

impl PipeIn for Paginate {
    fn pipe_in(
        &self,
        request: &Request,
        _response: &mut Response,
        route: &mut RouteContext,
        port: &mut PortView,
    ) -> Result<Flow<()>, BoxError> {
        let default_size = self.config.default_size as i64;
        let mut size = default_size;
        let mut page = 1;

        if let Some(spec) = request.value("__paginate").and_then(Value::as_str) {
            for (key, value) in pairs(spec) {
                match key {
                    "size" => size = value.parse().unwrap_or(default_size),
                    "page" => page = value.parse().unwrap_or(1),
                    _ => {}
                }
            }
        }
        if let Some(value) = request.value("__paginate_size").and_then(as_int) {
            size = value;
        }
        if let Some(value) = request.value("__paginate_page").and_then(as_int) {
            page = value;
        }

        let size = if size <= 0 { default_size } else { size.min(self.max_size(port)) };
        let page = page.max(1);
        route.stash(Self::NAME, json!({"page": page, "size": size}));
        Ok(Flow::Next(()))
    }
}

/// `key:value` pairs of a comma separated spec.
pub(crate) fn pairs(spec: &str) -> impl Iterator<Item = (&str, &str)> {
    spec.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
