#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use oxide_dispatch::middleware::{self, Next};
use oxide_dispatch::{
    Args, Controller, Handler, Middleware, Params, Parameter, Request, Response, RouterError,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Middleware that records entering and leaving the chain.
pub fn recorder(log: &Log, name: &'static str) -> impl Middleware + 'static {
    let log = Arc::clone(log);
    middleware::from_fn(move |_req: &Request, params: Params, next: Next<'_>| {
        log.lock().unwrap().push(format!("{name}>"));
        let res = next.run(params);
        log.lock().unwrap().push(format!("<{name}"));
        res
    })
}

/// Middleware that rejects requests without an `Authorization` header.
pub fn require_auth() -> impl Middleware + 'static {
    middleware::from_fn(|req: &Request, params: Params, next: Next<'_>| {
        if req.get_header("Authorization").is_some() {
            next.run(params)
        } else {
            Ok(Response::error(401, "Unauthorized"))
        }
    })
}

pub fn text(body: &'static str) -> Handler {
    Handler::closure(move |_| Ok(Response::text(body)))
}

/// Echoes the named parameters of the route.
pub fn echo() -> Handler {
    Handler::closure(|args| {
        let parts: Vec<String> = args
            .params()
            .iter()
            .map(|(name, value)| {
                format!("{}={}", name.unwrap_or("_"), value.as_str().unwrap_or("?"))
            })
            .collect();
        Ok(Response::text(parts.join(",")))
    })
}

pub fn body(res: &Response) -> String {
    res.body_string().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u32,
    pub name: String,
}

pub fn find_user(raw: &str) -> oxide_dispatch::Result<oxide_dispatch::Value> {
    match raw.parse::<u32>() {
        Ok(id) if id <= 10 => Ok(oxide_dispatch::Value::bound(User {
            id,
            name: format!("user{id}"),
        })),
        _ => Err(RouterError::ModelNotFound {
            param: "user".to_string(),
            value: raw.to_string(),
        }),
    }
}

pub struct PostController;

impl Controller for PostController {
    fn construct() -> Result<Self, String> {
        Ok(Self)
    }

    fn parameters(action: &str) -> Option<Vec<Parameter>> {
        match action {
            "index" | "create" | "store" => Some(Vec::new()),
            "show" | "edit" | "update" | "destroy" => Some(vec![Parameter::new("id")]),
            "page" => Some(vec![Parameter::new("page").with_default("1")]),
            "search" => Some(vec![Parameter::new("term").nullable()]),
            "fail" => Some(Vec::new()),
            _ => None,
        }
    }

    fn call(&mut self, action: &str, args: &Args) -> oxide_dispatch::Result<Response> {
        match action {
            "index" => Ok(Response::text("posts")),
            "page" => Ok(Response::text(format!(
                "page {}",
                args.str("page").unwrap_or("?")
            ))),
            "search" => Ok(Response::text(match args.str("term") {
                Some(term) => format!("search {term}"),
                None => "search all".to_string(),
            })),
            "fail" => Err(RouterError::Handler("database unavailable".to_string())),
            _ => Ok(Response::text(format!(
                "{action} {}",
                args.str("id").unwrap_or("-")
            ))),
        }
    }
}

pub struct BrokenController;

impl Controller for BrokenController {
    fn construct() -> Result<Self, String> {
        Err("missing dependency".to_string())
    }

    fn parameters(action: &str) -> Option<Vec<Parameter>> {
        (action == "index").then(Vec::new)
    }

    fn call(&mut self, _action: &str, _args: &Args) -> oxide_dispatch::Result<Response> {
        Ok(Response::text("unreachable"))
    }
}

pub fn health(_args: &Args) -> oxide_dispatch::Result<Response> {
    Ok(Response::text("healthy"))
}

pub fn health_handler() -> Handler {
    Handler::static_method("Status", "health", Vec::new(), health)
}
