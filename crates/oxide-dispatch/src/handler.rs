//! Route handlers.
//!
//! A handler is resolved to a concrete callable when the route is
//! registered: a closure, a controller action, or a static method. Each
//! target declares its parameters as a list of [`Parameter`]s, which the
//! dispatcher satisfies from the matched route parameters.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};
use crate::params::{Params, Value};
use crate::request::Request;
use crate::response::Response;

/// A callable handler body.
pub type ActionFn = Arc<dyn Fn(&Args) -> Result<Response> + Send + Sync>;

type ControllerFn = Arc<dyn Fn(&str, &Args) -> Result<Response> + Send + Sync>;
type InjectFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Returns the unqualified name of `T`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A formal parameter of a handler.
#[derive(Clone)]
pub struct Parameter {
    name: String,
    default: Option<Value>,
    nullable: bool,
    inject: Option<InjectFn>,
}

impl Parameter {
    /// Creates a required parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            nullable: false,
            inject: None,
        }
    }

    /// Sets the value used when the route provides none.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Resolves to [`Value::Null`] when the route provides no value.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Opts in to constructing a `T` when nothing else satisfies the parameter.
    #[must_use]
    pub fn injected<T: Default + Any + Send + Sync>(mut self) -> Self {
        self.inject = Some(Arc::new(|| Value::bound(T::default())));
        self
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("nullable", &self.nullable)
            .field("injected", &self.inject.is_some())
            .finish()
    }
}

/// Arguments passed to a handler.
#[derive(Debug, Clone)]
pub struct Args {
    request: Request,
    params: Params,
    resolved: Vec<(String, Value)>,
}

impl Args {
    pub(crate) fn new(request: Request, params: Params) -> Self {
        Self {
            request,
            params,
            resolved: Vec::new(),
        }
    }

    /// Returns the request being handled.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the bound route parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Gets an argument by name: declared parameters first, then route
    /// parameters.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.resolved
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .or_else(|| self.params.get(name))
    }

    /// Gets an argument by name as a raw string.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Gets an argument by name as a bound value of type `T`.
    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(Value::downcast)
    }

    /// Parses a raw string argument.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.str(name).and_then(|v| v.parse().ok())
    }

    /// Gets a declared parameter by position.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.resolved.get(index).map(|(_, v)| v)
    }

    /// Satisfies each declared parameter, in order of preference: by name,
    /// by position, by default, as null, by injection.
    pub(crate) fn resolve(mut self, handler: &str, signature: &[Parameter]) -> Result<Self> {
        let mut resolved = Vec::with_capacity(signature.len());
        for (index, param) in signature.iter().enumerate() {
            let value = self
                .params
                .get(&param.name)
                .or_else(|| self.params.at(index))
                .cloned()
                .or_else(|| param.default.clone())
                .or_else(|| param.nullable.then_some(Value::Null))
                .or_else(|| param.inject.as_ref().map(|inject| inject()))
                .ok_or_else(|| RouterError::MissingParameter {
                    handler: handler.to_string(),
                    param: param.name.clone(),
                })?;
            resolved.push((param.name.clone(), value));
        }
        self.resolved = resolved;
        Ok(self)
    }
}

/// A controller whose actions can be routed to.
///
/// A fresh controller is constructed for every request it handles.
///
/// ```ignore
/// #[derive(Default)]
/// struct UserController;
///
/// impl Controller for UserController {
///     fn construct() -> Result<Self, String> {
///         Ok(Self)
///     }
///
///     fn parameters(action: &str) -> Option<Vec<Parameter>> {
///         match action {
///             "index" => Some(vec![]),
///             "show" => Some(vec![Parameter::new("id")]),
///             _ => None,
///         }
///     }
///
///     fn call(&mut self, action: &str, args: &Args) -> oxide_dispatch::Result<Response> {
///         match action {
///             "index" => Ok(Response::text("all users")),
///             _ => Ok(Response::text(format!("user {}", args.str("id").unwrap_or("?")))),
///         }
///     }
/// }
/// ```
pub trait Controller: Send + 'static {
    /// Builds a controller instance.
    fn construct() -> std::result::Result<Self, String>
    where
        Self: Sized;

    /// Declares the parameters of an action; `None` if there is no such action.
    fn parameters(action: &str) -> Option<Vec<Parameter>>
    where
        Self: Sized;

    /// Invokes an action.
    fn call(&mut self, action: &str, args: &Args) -> Result<Response>;

    /// The name this controller is registered and cached under.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }
}

/// A serializable reference to a handler, used by the route cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerRef {
    /// An inline closure.
    Closure,
    /// A controller action.
    Controller { controller: String, action: String },
    /// A static method.
    Static { type_name: String, method: String },
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure => f.write_str("Closure"),
            Self::Controller { controller, action } => write!(f, "{controller}@{action}"),
            Self::Static { type_name, method } => write!(f, "{type_name}::{method}"),
        }
    }
}

/// A route handler.
#[derive(Clone)]
pub enum Handler {
    /// A closure. Without a signature it sees the route parameters only
    /// through [`Args::params`] and [`Args::get`].
    Closure {
        signature: Vec<Parameter>,
        func: ActionFn,
    },
    /// A controller action: the controller is constructed, then the action
    /// invoked.
    Controller {
        controller: String,
        action: String,
        /// `None` when the controller does not declare the action.
        signature: Option<Vec<Parameter>>,
        invoke: ControllerFn,
    },
    /// A static method.
    Static {
        type_name: String,
        method: String,
        signature: Vec<Parameter>,
        func: ActionFn,
    },
}

impl Handler {
    /// Creates a closure handler.
    pub fn closure<F>(func: F) -> Self
    where
        F: Fn(&Args) -> Result<Response> + Send + Sync + 'static,
    {
        Self::closure_with(Vec::new(), func)
    }

    /// Creates a closure handler with declared parameters.
    pub fn closure_with<F>(signature: Vec<Parameter>, func: F) -> Self
    where
        F: Fn(&Args) -> Result<Response> + Send + Sync + 'static,
    {
        Self::Closure {
            signature,
            func: Arc::new(func),
        }
    }

    /// Creates a handler for an action of controller `C`.
    pub fn controller<C: Controller>(action: &str) -> Self {
        let controller = C::name().to_string();
        let name = controller.clone();
        Self::Controller {
            signature: C::parameters(action),
            action: action.to_string(),
            controller,
            invoke: Arc::new(move |action: &str, args: &Args| {
                let mut instance =
                    C::construct().map_err(|reason| RouterError::ControllerInstantiation {
                        controller: name.clone(),
                        reason,
                    })?;
                instance.call(action, args)
            }),
        }
    }

    /// Creates a static method handler.
    pub fn static_method(
        type_name: &str,
        method: &str,
        signature: Vec<Parameter>,
        func: fn(&Args) -> Result<Response>,
    ) -> Self {
        Self::Static {
            type_name: type_name.to_string(),
            method: method.to_string(),
            signature,
            func: Arc::new(func),
        }
    }

    /// Returns the serializable reference for this handler.
    pub fn reference(&self) -> HandlerRef {
        match self {
            Self::Closure { .. } => HandlerRef::Closure,
            Self::Controller {
                controller, action, ..
            } => HandlerRef::Controller {
                controller: controller.clone(),
                action: action.clone(),
            },
            Self::Static {
                type_name, method, ..
            } => HandlerRef::Static {
                type_name: type_name.clone(),
                method: method.clone(),
            },
        }
    }

    /// Checks that the handler resolves to a callable target.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Controller {
                controller,
                action,
                signature: None,
                ..
            } => Err(RouterError::InvalidHandler(format!(
                "controller '{controller}' has no action '{action}'"
            ))),
            _ => Ok(()),
        }
    }

    /// Returns true if a controller handler's action exists.
    pub(crate) fn is_declared(&self) -> bool {
        !matches!(self, Self::Controller { signature: None, .. })
    }

    /// Resolves the declared parameters and invokes the target.
    pub fn invoke(&self, request: &Request, params: Params) -> Result<Response> {
        let args = Args::new(request.clone(), params);
        match self {
            Self::Closure { signature, func } => func(&args.resolve("Closure", signature)?),
            Self::Controller {
                controller,
                action,
                signature,
                invoke,
            } => {
                let signature = signature.as_ref().ok_or_else(|| {
                    RouterError::InvalidHandler(format!(
                        "controller '{controller}' has no action '{action}'"
                    ))
                })?;
                let name = self.reference().to_string();
                invoke(action, &args.resolve(&name, signature)?)
            }
            Self::Static {
                signature, func, ..
            } => {
                let name = self.reference().to_string();
                func(&args.resolve(&name, signature)?)
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.reference())
    }
}

type ControllerFactory = Arc<dyn Fn(&str) -> Handler + Send + Sync>;

/// Resolves cached [`HandlerRef`]s back to callable handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    controllers: HashMap<String, ControllerFactory>,
    statics: HashMap<(String, String), Handler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers controller `C` under [`Controller::name`].
    pub fn register_controller<C: Controller>(&mut self) {
        self.controllers
            .insert(C::name().to_string(), Arc::new(Handler::controller::<C>));
    }

    /// Registers a handler so cached references to it can be resolved.
    ///
    /// Closures cannot be referenced from the cache and are ignored.
    pub fn register(&mut self, handler: &Handler) {
        if let Handler::Static {
            type_name, method, ..
        } = handler
        {
            self.statics
                .insert((type_name.clone(), method.clone()), handler.clone());
        }
    }

    /// Resolves a reference.
    pub fn resolve(&self, reference: &HandlerRef) -> Result<Handler> {
        match reference {
            HandlerRef::Closure => Err(RouterError::InvalidHandler(
                "closure handlers cannot be restored from the route cache".to_string(),
            )),
            HandlerRef::Controller { controller, action } => {
                let factory = self.controllers.get(controller).ok_or_else(|| {
                    RouterError::InvalidHandler(format!("unknown controller '{controller}'"))
                })?;
                let handler = factory(action);
                handler.validate()?;
                Ok(handler)
            }
            HandlerRef::Static { type_name, method } => self
                .statics
                .get(&(type_name.clone(), method.clone()))
                .cloned()
                .ok_or_else(|| {
                    RouterError::InvalidHandler(format!(
                        "unknown static method '{type_name}::{method}'"
                    ))
                }),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("controllers", &self.controllers.keys().collect::<Vec<_>>())
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Mailer {
        from: String,
    }

    struct PostController;

    impl Controller for PostController {
        fn construct() -> std::result::Result<Self, String> {
            Ok(Self)
        }

        fn parameters(action: &str) -> Option<Vec<Parameter>> {
            match action {
                "show" => Some(vec![Parameter::new("id")]),
                "list" => Some(vec![
                    Parameter::new("page").with_default("1"),
                    Parameter::new("tag").nullable(),
                ]),
                _ => None,
            }
        }

        fn call(&mut self, action: &str, args: &Args) -> Result<Response> {
            match action {
                "show" => Ok(Response::text(format!("post {}", args.str("id").unwrap_or("?")))),
                _ => Ok(Response::text(format!(
                    "page {} tag {}",
                    args.str("page").unwrap_or("?"),
                    args.get("tag").map_or(false, Value::is_null)
                ))),
            }
        }
    }

    struct Broken;

    impl Controller for Broken {
        fn construct() -> std::result::Result<Self, String> {
            Err("database unavailable".to_string())
        }

        fn parameters(_action: &str) -> Option<Vec<Parameter>> {
            Some(Vec::new())
        }

        fn call(&mut self, _action: &str, _args: &Args) -> Result<Response> {
            Ok(Response::ok())
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        let mut params = Params::new();
        for (k, v) in pairs {
            params.insert(*k, *v);
        }
        params
    }

    #[test]
    fn test_controller_invoke() {
        let handler = Handler::controller::<PostController>("show");
        assert!(handler.validate().is_ok());
        let res = handler
            .invoke(&Request::get("/posts/9"), params(&[("id", "9")]))
            .unwrap();
        assert_eq!(res.body_string(), Some("post 9".to_string()));
    }

    #[test]
    fn test_defaults_and_nullable() {
        let handler = Handler::controller::<PostController>("list");
        let res = handler.invoke(&Request::get("/posts"), Params::new()).unwrap();
        assert_eq!(res.body_string(), Some("page 1 tag true".to_string()));
    }

    #[test]
    fn test_unknown_action_is_invalid() {
        let handler = Handler::controller::<PostController>("destroy");
        assert!(matches!(handler.validate(), Err(RouterError::InvalidHandler(_))));
        assert!(matches!(
            handler.invoke(&Request::get("/"), Params::new()),
            Err(RouterError::InvalidHandler(_))
        ));
    }

    #[test]
    fn test_controller_instantiation_error() {
        let handler = Handler::controller::<Broken>("index");
        let err = handler.invoke(&Request::get("/"), Params::new()).unwrap_err();
        assert!(matches!(err, RouterError::ControllerInstantiation { ref controller, .. } if controller == "Broken"));
    }

    #[test]
    fn test_positional_resolution() {
        let handler = Handler::closure_with(vec![Parameter::new("year")], |args| {
            Ok(Response::text(args.arg(0).and_then(Value::as_str).unwrap_or("?").to_string()))
        });
        let mut positional = Params::new();
        positional.push_positional("2024");
        let res = handler.invoke(&Request::get("/"), positional).unwrap();
        assert_eq!(res.body_string(), Some("2024".to_string()));
    }

    #[test]
    fn test_name_beats_position() {
        let handler = Handler::closure_with(
            vec![Parameter::new("b"), Parameter::new("a")],
            |args| {
                Ok(Response::text(format!(
                    "{}{}",
                    args.arg(0).and_then(Value::as_str).unwrap_or("?"),
                    args.arg(1).and_then(Value::as_str).unwrap_or("?")
                )))
            },
        );
        let res = handler
            .invoke(&Request::get("/"), params(&[("a", "1"), ("b", "2")]))
            .unwrap();
        assert_eq!(res.body_string(), Some("21".to_string()));
    }

    #[test]
    fn test_injection_is_last_resort() {
        let handler = Handler::closure_with(vec![Parameter::new("mailer").injected::<Mailer>()], |args| {
            let mailer = args.get_as::<Mailer>("mailer").expect("injected mailer");
            Ok(Response::text(format!("from '{}'", mailer.from)))
        });
        let res = handler.invoke(&Request::get("/"), Params::new()).unwrap();
        assert_eq!(res.body_string(), Some("from ''".to_string()));
    }

    #[test]
    fn test_missing_parameter() {
        let handler = Handler::static_method("Api", "ping", vec![Parameter::new("token")], |_| {
            Ok(Response::ok())
        });
        let err = handler.invoke(&Request::get("/"), Params::new()).unwrap_err();
        assert!(matches!(
            err,
            RouterError::MissingParameter { ref handler, ref param } if handler == "Api::ping" && param == "token"
        ));
    }

    #[test]
    fn test_registry_resolves_references() {
        let ping = Handler::static_method("Api", "ping", Vec::new(), |_| Ok(Response::text("pong")));
        let mut registry = HandlerRegistry::new();
        registry.register_controller::<PostController>();
        registry.register(&ping);

        let show = registry
            .resolve(&HandlerRef::Controller {
                controller: "PostController".to_string(),
                action: "show".to_string(),
            })
            .unwrap();
        assert_eq!(show.reference().to_string(), "PostController@show");

        let restored = registry.resolve(&ping.reference()).unwrap();
        let res = restored.invoke(&Request::get("/"), Params::new()).unwrap();
        assert_eq!(res.body_string(), Some("pong".to_string()));

        assert!(registry.resolve(&HandlerRef::Closure).is_err());
        assert!(registry
            .resolve(&HandlerRef::Controller {
                controller: "PostController".to_string(),
                action: "missing".to_string(),
            })
            .is_err());
    }
}
