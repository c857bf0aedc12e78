//! The `response_support` outbound pipe.

use serde_json::Value;

use crate::http::request::Request;
use crate::http::response::{ContextKind, Response};
use crate::pipeline::context::RouteContext;
use crate::pipeline::pipe::PipeOut;
use crate::pipeline::stage::Flow;
use crate::port::{Output, PortView};
use crate::BoxError;

/// Turns a page into its list and publishes the paginator metadata to the
/// wrap-out context.
pub struct ResponseSupport;

impl ResponseSupport {
    pub const NAME: &'static str = "response_support";
}

impl PipeOut for ResponseSupport {
    fn pipe_out(
        &self,
        output: Output,
        _request: &Request,
        response: &mut Response,
        _route: &RouteContext,
        _port: &PortView,
    ) -> Result<Flow<Output>, BoxError> {
        match output {
            Output::Page(page) => {
                response.add_context(ContextKind::WrapOut, "paginator", page.meta());
                Ok(Flow::Next(Output::Data(Value::Array(page.list))))
            }
            data => Ok(Flow::Next(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::testing::{port_with_extra, route};
    use crate::port::Page;
    use serde_json::json;

    #[test]
    fn test_page_becomes_list_plus_context() {
        let mut response = Response::new();
        let page = Page::new(vec![json!(1), json!(2)], 1, 2, 9);
        let flow = ResponseSupport
            .pipe_out(
                Output::Page(page),
                &Request::get("/"),
                &mut response,
                &route(),
                &port_with_extra(None),
            )
            .unwrap();
        assert_eq!(flow, Flow::Next(Output::Data(json!([1, 2]))));
        assert_eq!(
            response.context(ContextKind::WrapOut)["paginator"],
            json!({"page": 1, "size": 2, "count": 2, "total": 9})
        );
    }
}
