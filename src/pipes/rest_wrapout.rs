//! The `rest_wrapout` inbound pipe.

use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::verb::Verb;
use crate::pipeline::context::RouteContext;
use crate::pipeline::pipe::PipeIn;
use crate::pipeline::stage::Flow;
use crate::port::{PortView, SettingValue};
use crate::BoxError;

/// Picks the envelope by verb: `action_only` for PUT, PATCH and DELETE,
/// `http` for everything else. Applies to this request only.
pub struct RestWrapout;

impl RestWrapout {
    pub const NAME: &'static str = "rest_wrapout";
}

impl PipeIn for RestWrapout {
    fn pipe_in(
        &self,
        request: &Request,
        _response: &mut Response,
        _route: &mut RouteContext,
        port: &mut PortView,
    ) -> Result<Flow<()>, BoxError> {
        let wrapper = match request.verb() {
            Some(Verb::Put | Verb::Patch | Verb::Delete) => "action_only",
            _ => "http",
        };
        port.set("WRAPOUT", Some(SettingValue::from(wrapper)))?;
        port.set("WRAPERR", Some(SettingValue::from(wrapper)))?;
        Ok(Flow::Next(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::testing::{port_with_extra, route};

    #[test]
    fn test_selects_wrapper_by_verb() {
        let mut port = port_with_extra(None);
        RestWrapout
            .pipe_in(
                &Request::new(Some(Verb::Delete), "/items/1"),
                &mut Response::new(),
                &mut route(),
                &mut port,
            )
            .unwrap();
        assert_eq!(port.settings.wrapout.as_deref(), Some("action_only"));
        assert_eq!(port.settings.wraperr.as_deref(), Some("action_only"));

        let mut port = port_with_extra(None);
        RestWrapout
            .pipe_in(&Request::get("/items"), &mut Response::new(), &mut route(), &mut port)
            .unwrap();
        assert_eq!(port.settings.wrapout.as_deref(), Some("http"));
    }
}
