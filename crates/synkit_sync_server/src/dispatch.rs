//! Method name to engine operation mapping.

use crate::error::{ServerError, ServerResult};
use serde_json::Value as Json;
use std::sync::Arc;
use synkit_codec::Principal;
use synkit_storage::EntityStore;
use synkit_sync_engine::SyncEngine;
use synkit_sync_protocol::{
    EntityPayload, Request, RequestId, Response, METHOD_SYNC_DELETED_ENTITY, METHOD_SYNC_ENTITY,
    METHOD_TEST,
};
use tracing::{debug, warn};

/// Dispatches JSON-RPC requests to a [`SyncEngine`].
///
/// | Method              | Params             | Result                |
/// |---------------------|--------------------|-----------------------|
/// | `syncEntity`        | `[entity, hash]`   | `SyncEntityResult`    |
/// | `syncDeletedEntity` | `[remoteKey]`      | `SyncDeletedResult`   |
/// | `test`              | `[anything]`       | the parameter         |
pub struct RpcDispatcher<S: EntityStore> {
    engine: Arc<SyncEngine<S>>,
}

impl<S: EntityStore> RpcDispatcher<S> {
    /// Creates a dispatcher over `engine`.
    pub fn new(engine: Arc<SyncEngine<S>>) -> Self {
        Self { engine }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Arc<SyncEngine<S>> {
        &self.engine
    }

    /// Runs one method call.
    ///
    /// # Errors
    ///
    /// - [`ServerError::MethodNotFound`] for unknown methods
    /// - [`ServerError::InvalidParams`] if the params do not fit the method
    /// - [`ServerError::Sync`] if the engine rejects the request
    pub fn call(
        &self,
        method: &str,
        params: &[Json],
        principal: Option<&Principal>,
    ) -> ServerResult<Json> {
        debug!(method, params = params.len(), "dispatching");
        match method {
            METHOD_SYNC_ENTITY => {
                let [entity, hash] = params else {
                    return Err(ServerError::invalid_params(
                        "syncEntity expects [entity, hash]",
                    ));
                };
                let payload: EntityPayload = serde_json::from_value(entity.clone())
                    .map_err(|e| ServerError::invalid_params(format!("entity: {e}")))?;
                let hash = hash
                    .as_str()
                    .ok_or_else(|| ServerError::invalid_params("hash must be a string"))?;
                let result = self.engine.sync_entity(&payload, hash, principal)?;
                to_json(&result)
            }
            METHOD_SYNC_DELETED_ENTITY => {
                let [key] = params else {
                    return Err(ServerError::invalid_params(
                        "syncDeletedEntity expects [key]",
                    ));
                };
                let key = key
                    .as_str()
                    .ok_or_else(|| ServerError::invalid_params("key must be a string"))?;
                let result = self.engine.sync_deleted_entity(key, principal)?;
                to_json(&result)
            }
            METHOD_TEST => match params {
                [param] => Ok(param.clone()),
                _ => Err(ServerError::invalid_params("test expects [param]")),
            },
            other => Err(ServerError::MethodNotFound(other.to_string())),
        }
    }

    /// Handles a parsed request.
    ///
    /// Returns `None` for notifications (requests without an id); they are
    /// still applied.
    pub fn handle(&self, request: &Request, principal: Option<&Principal>) -> Option<Response> {
        let outcome = self.call(&request.method, &request.params, principal);
        if let Err(err) = &outcome {
            if err.is_client_error() {
                warn!(method = %request.method, kind = err.kind(), error = %err, "request rejected");
            } else {
                warn!(method = %request.method, error = %err, "request failed");
            }
        }
        let id = request.id.clone()?;
        Some(respond(Some(id), outcome))
    }

    /// Parses and handles one request line.
    ///
    /// Lines that are not requests are answered with a parse or invalid
    /// request error and a `null` id.
    pub fn handle_line(&self, line: &str, principal: Option<&Principal>) -> Option<Response> {
        match parse_request(line) {
            Ok(request) => self.handle(&request, principal),
            Err(response) => Some(response),
        }
    }
}

/// Parses a request line, or builds the error response for it.
///
/// # Errors
///
/// Returns a ready-to-send [`Response`] with [`ServerError::Parse`] or
/// [`ServerError::InvalidRequest`]. The id is kept when the JSON carried one.
pub fn parse_request(line: &str) -> Result<Request, Response> {
    let value: Json = serde_json::from_str(line)
        .map_err(|e| respond(None, Err(ServerError::Parse(e.to_string()))))?;
    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
    serde_json::from_value(value)
        .map_err(|e| respond(id, Err(ServerError::InvalidRequest(e.to_string()))))
}

/// Builds a response from a call outcome.
pub fn respond(id: Option<RequestId>, outcome: ServerResult<Json>) -> Response {
    match outcome {
        Ok(result) => Response::result(id, result),
        Err(err) => Response::error(id, err.to_error_object()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> ServerResult<Json> {
    serde_json::to_value(value).map_err(|e| ServerError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use synkit_codec::{Key, PathElement};
    use synkit_storage::InMemoryStore;
    use synkit_sync_engine::EngineConfig;

    fn dispatcher() -> RpcDispatcher<InMemoryStore> {
        let engine = SyncEngine::new(EngineConfig::new("test"), InMemoryStore::new());
        RpcDispatcher::new(Arc::new(engine))
    }

    fn book_key() -> String {
        Key::root("test", None, PathElement::new("Book", "catcher"))
            .unwrap()
            .to_remote()
    }

    fn book(version: u64) -> Json {
        json!({
            "kind": "Book",
            "key": book_key(),
            "name": "catcher",
            "version": version,
            "properties": {
                "title": { "type": "string", "value": "The Catcher in the Rye" }
            }
        })
    }

    #[test]
    fn sync_entity_call() {
        let dispatcher = dispatcher();
        let result = dispatcher
            .call("syncEntity", &[book(0), json!("h1")], None)
            .unwrap();
        assert_eq!(result["status"], 3);
        assert_eq!(result["version"], 1);
        assert_eq!(result["key"], book_key());

        let result = dispatcher
            .call("syncEntity", &[book(1), json!("h1")], None)
            .unwrap();
        assert_eq!(result["status"], 1);
    }

    #[test]
    fn sync_deleted_entity_call() {
        let dispatcher = dispatcher();
        dispatcher
            .call("syncEntity", &[book(0), json!("h1")], None)
            .unwrap();

        let result = dispatcher
            .call("syncDeletedEntity", &[json!(book_key())], None)
            .unwrap();
        assert_eq!(result, json!({ "status": 5 }));

        let result = dispatcher
            .call("syncDeletedEntity", &[json!(book_key())], None)
            .unwrap();
        assert_eq!(result, json!({ "status": 4 }));
    }

    #[test]
    fn test_method_echoes() {
        let dispatcher = dispatcher();
        let param = json!({ "ping": [1, 2, 3] });
        assert_eq!(
            dispatcher.call("test", &[param.clone()], None).unwrap(),
            param
        );
        assert!(matches!(
            dispatcher.call("test", &[], None),
            Err(ServerError::InvalidParams(_))
        ));
    }

    #[test]
    fn invalid_params() {
        let dispatcher = dispatcher();
        for params in [
            vec![],
            vec![book(0)],
            vec![book(0), json!(7)],
            vec![json!("not an entity"), json!("h")],
        ] {
            let err = dispatcher.call("syncEntity", &params, None).unwrap_err();
            assert_eq!(err.code(), -32602, "{params:?}");
        }

        let err = dispatcher
            .call("syncDeletedEntity", &[json!(1)], None)
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[test]
    fn unknown_method() {
        let err = dispatcher().call("pull", &[], None).unwrap_err();
        assert_eq!(err.code(), -32601);
    }

    #[test]
    fn engine_errors_become_application_errors() {
        let dispatcher = dispatcher();
        dispatcher
            .call("syncEntity", &[book(0), json!("h1")], None)
            .unwrap();
        let err = dispatcher
            .call("syncEntity", &[book(5), json!("h2")], None)
            .unwrap_err();
        assert_eq!(err.kind(), "VersionConflict");
        assert_eq!(err.code(), -32007);
    }

    #[test]
    fn handle_line_envelopes() {
        let dispatcher = dispatcher();

        let response = dispatcher
            .handle_line(r#"{"jsonrpc":"2.0","method":"test","params":["hi"],"id":1}"#, None)
            .unwrap();
        assert_eq!(response.id, Some(RequestId::Number(1)));
        assert_eq!(response.as_result(), Some(&json!("hi")));

        let response = dispatcher.handle_line("{not json", None).unwrap();
        assert_eq!(response.id, None);
        assert_eq!(response.as_error().unwrap().code, -32700);

        let response = dispatcher
            .handle_line(r#"{"jsonrpc":"1.0","method":"test","id":"a"}"#, None)
            .unwrap();
        assert_eq!(response.id, Some(RequestId::String("a".into())));
        assert_eq!(response.as_error().unwrap().code, -32600);

        let response = dispatcher
            .handle_line(r#"{"jsonrpc":"2.0","method":"nope","id":2}"#, None)
            .unwrap();
        let error = response.as_error().unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.data, Some(json!({ "kind": "MethodNotFound" })));
    }

    #[test]
    fn notifications_are_applied_silently() {
        let dispatcher = dispatcher();
        let line = json!({
            "jsonrpc": "2.0",
            "method": "syncEntity",
            "params": [book(0), "h1"]
        })
        .to_string();
        assert!(dispatcher.handle_line(&line, None).is_none());
        assert_eq!(dispatcher.engine().stats().stored, 1);
    }
}
