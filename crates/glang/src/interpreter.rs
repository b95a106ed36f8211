//! Tree-walking evaluator for parsed G programs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gaia_domain::{GValue, ObjectId};

use crate::error::GError;
use crate::host::Host;
use crate::parser::{ExecutionTarget, Literal, Node, SendPayload};
use crate::stdlib;

/// Default recursion depth ceiling (spec §4.4).
pub const DEFAULT_MAX_DEPTH: u32 = 128;

/// Default wall-clock budget per top-level invocation (spec §4.4).
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(500);

/// Shared across every nested context spawned from one top-level
/// invocation, so a timeout set deep in a call chain is visible to every
/// frame, including the ones that started before it.
struct Budget {
    deadline: Instant,
    cancelled: AtomicBool,
}

impl Budget {
    fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            cancelled: AtomicBool::new(false),
        }
    }

    fn expired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        if Instant::now() >= self.deadline {
            self.cancelled.store(true, Ordering::Relaxed);
            true
        } else {
            false
        }
    }
}

/// Caches parsed attribute/variable source for the lifetime of one top-level
/// invocation. Keyed by the source text (and its length, as a cheap
/// pre-hash discriminator) rather than the attribute name, since the same
/// source can be reached through different names (`@var`, an attribute, a
/// re-`quote`d value) and two different attributes never share a cache
/// entry unless their text is byte-for-byte identical. Scoped per
/// invocation, not global: attributes can be rewritten by `set_attr`
/// between separate top-level calls, so a cross-call cache would risk
/// evaluating stale source.
struct ParseCache {
    entries: Mutex<HashMap<(String, usize), Arc<Node>>>,
}

impl ParseCache {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_parse(&self, source: &str) -> Result<Arc<Node>, GError> {
        let key = (source.to_string(), source.len());
        if let Some(node) = self.entries.lock().unwrap().get(&key) {
            return Ok(node.clone());
        }
        let node = Arc::new(crate::parser::parse(source)?);
        self.entries.lock().unwrap().insert(key, node.clone());
        Ok(node)
    }
}

/// The context a G expression evaluates under: who is running the code,
/// on whose behalf, and against which object attribute calls default.
pub struct EvalContext {
    pub executor: ObjectId,
    pub actor: ObjectId,
    pub this: ObjectId,
    pub depth: u32,
    pub max_depth: u32,
    vars: HashMap<String, GValue>,
    budget: Arc<Budget>,
    parse_cache: Arc<ParseCache>,
}

impl EvalContext {
    /// Starts a fresh top-level invocation with its own time budget.
    pub fn top_level(executor: ObjectId, actor: ObjectId, this: ObjectId) -> Self {
        Self::top_level_with_budget(executor, actor, this, DEFAULT_BUDGET, DEFAULT_MAX_DEPTH)
    }

    pub fn top_level_with_budget(
        executor: ObjectId,
        actor: ObjectId,
        this: ObjectId,
        budget: Duration,
        max_depth: u32,
    ) -> Self {
        Self {
            executor,
            actor,
            this,
            depth: 0,
            max_depth,
            vars: HashMap::new(),
            budget: Arc::new(Budget::new(budget)),
            parse_cache: Arc::new(ParseCache::new()),
        }
    }

    /// A child context for a nested attribute invocation: shares the
    /// invocation's overall time budget and depth counter lineage, but gets
    /// its own lexical frame.
    pub fn child(&self, executor: ObjectId, actor: ObjectId, this: ObjectId) -> Result<Self, GError> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(GError::DepthLimit);
        }
        Ok(Self {
            executor,
            actor,
            this,
            depth,
            max_depth: self.max_depth,
            vars: HashMap::new(),
            budget: self.budget.clone(),
            parse_cache: self.parse_cache.clone(),
        })
    }

    pub fn check_budget(&self) -> Result<(), GError> {
        if self.budget.expired() {
            Err(GError::Timeout)
        } else {
            Ok(())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.budget.cancelled.load(Ordering::Relaxed)
    }

    pub fn define(&mut self, name: impl Into<String>, value: GValue) {
        self.vars.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&GValue> {
        self.vars.get(name)
    }
}

/// Signals that can unwind out of an evaluation: an ordinary error, or a
/// `return` that should stop at the nearest attribute-invocation boundary.
#[derive(Debug)]
pub enum Signal {
    Error(GError),
    Return(GValue),
}

impl From<GError> for Signal {
    fn from(err: GError) -> Self {
        Signal::Error(err)
    }
}

pub type EvalResult = Result<GValue, Signal>;

/// Evaluates `node` under `ctx`, delegating world access to `host`.
pub async fn eval(node: &Node, ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    ctx.check_budget()?;
    match node {
        Node::Literal(lit, _) => Ok(literal_value(lit)),
        Node::ObjectRef(name, _) => {
            let id = host.get_object(name, ctx).await?;
            Ok(GValue::ObjectRef(id))
        }
        Node::Symbol(name, span) => ctx
            .lookup(name)
            .cloned()
            .ok_or_else(|| GError::unresolved_callee(name.clone(), *span).into()),
        Node::AttributeAccess { base, attr, .. } => {
            let target = resolve_ref(base, ctx, host).await?;
            match host.get_attr(&target, attr).await? {
                Some(value) => Ok(value),
                None => Ok(GValue::Null),
            }
        }
        Node::Execution { target, span } => eval_execution(target, *span, ctx, host).await,
        Node::Send { target, payload, span } => {
            let target_id = resolve_ref(target, ctx, host).await?;
            let value = match payload {
                SendPayload::Literal(s) => GValue::string(s.clone()),
                SendPayload::Execution(exec_target) => {
                    let mut child = ctx.child(ctx.executor.clone(), ctx.actor.clone(), target_id.clone())?;
                    eval_execution(exec_target, *span, &mut child, host).await?
                }
            };
            host.send(&target_id, value.clone()).await?;
            Ok(value)
        }
        Node::List(items, span) => eval_list(items, *span, ctx, host).await,
    }
}

fn literal_value(lit: &Literal) -> GValue {
    match lit {
        Literal::String(s) => GValue::string(s.clone()),
        Literal::Number(n) => GValue::Number(*n),
        Literal::Boolean(b) => GValue::Boolean(*b),
        Literal::Nil => GValue::Null,
    }
}

/// Resolves a node that should name an object: an `ObjectRef`, a `Symbol`
/// bound to one, or any expression whose value is an `ObjectRef`.
async fn resolve_ref(node: &Node, ctx: &mut EvalContext, host: &dyn Host) -> Result<ObjectId, Signal> {
    match node {
        Node::ObjectRef(name, _) => Ok(host.get_object(name, ctx).await?),
        Node::Symbol(name, span) => match ctx.lookup(name).cloned() {
            Some(GValue::ObjectRef(id)) => Ok(id),
            Some(GValue::String(s)) => Ok(host.get_object(&s, ctx).await?),
            _ => Err(GError::unresolved_callee(name.clone(), *span).into()),
        },
        other => {
            let value = Box::pin(eval(other, ctx, host)).await?;
            match value {
                GValue::ObjectRef(id) => Ok(id),
                GValue::String(s) => Ok(host.get_object(&s, ctx).await?),
                _ => Err(GError::type_coercion("expected an object reference", other.span()).into()),
            }
        }
    }
}

async fn eval_execution(
    target: &ExecutionTarget,
    span: crate::lexer::Span,
    ctx: &mut EvalContext,
    host: &dyn Host,
) -> EvalResult {
    invoke_execution(target, span, ctx, host, Vec::new()).await
}

/// Invokes an execution target with an already-evaluated argument list,
/// used both for bare `@expr` evaluation and for list heads that are
/// execution forms (`[@obj.attr a b]`).
pub(crate) async fn invoke_execution(
    target: &ExecutionTarget,
    span: crate::lexer::Span,
    ctx: &mut EvalContext,
    host: &dyn Host,
    args: Vec<GValue>,
) -> EvalResult {
    match target {
        ExecutionTarget::ObjectRun(reference) => {
            let object = resolve_ref(reference, ctx, host).await?;
            invoke_attribute(&object, "run", args, ctx, host).await
        }
        ExecutionTarget::ObjectAttr(reference, attr) => {
            let object = resolve_ref(reference, ctx, host).await?;
            invoke_attribute(&object, attr, args, ctx, host).await
        }
        ExecutionTarget::Variable(name) => {
            let source = match ctx.lookup(name).cloned() {
                Some(GValue::Source(s)) | Some(GValue::String(s)) => s,
                Some(_) => {
                    return Err(GError::type_coercion(
                        format!("variable {name} does not hold executable source"),
                        span,
                    )
                    .into());
                }
                None => return Err(GError::unresolved_callee(name.clone(), span).into()),
            };
            let parsed = ctx.parse_cache.get_or_parse(&source).map_err(Signal::Error)?;
            let mut child = ctx.child(ctx.executor.clone(), ctx.actor.clone(), ctx.this.clone())?;
            for (i, arg) in args.into_iter().enumerate() {
                child.define(format!("arg{i}"), arg);
            }
            match Box::pin(eval(&parsed, &mut child, host)).await {
                Ok(value) => Ok(value),
                Err(Signal::Return(value)) => Ok(value),
                Err(err) => Err(err),
            }
        }
    }
}

async fn invoke_attribute(
    object: &ObjectId,
    attr: &str,
    args: Vec<GValue>,
    ctx: &mut EvalContext,
    host: &dyn Host,
) -> EvalResult {
    let source = match host.get_attr(object, attr).await? {
        Some(GValue::Source(s)) | Some(GValue::String(s)) => s,
        Some(_) | None => {
            return Err(GError::not_found(format!("{object}.{attr} is not executable")).into());
        }
    };
    let parsed = ctx.parse_cache.get_or_parse(&source).map_err(Signal::Error)?;
    let mut child = ctx.child(object.clone(), ctx.actor.clone(), object.clone())?;
    for (i, arg) in args.into_iter().enumerate() {
        child.define(format!("arg{i}"), arg);
    }
    match Box::pin(eval(&parsed, &mut child, host)).await {
        Ok(value) => Ok(value),
        Err(Signal::Return(value)) => Ok(value),
        Err(err) => Err(err),
    }
}

async fn eval_list(items: &[Node], _span: crate::lexer::Span, ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    let Some(head) = items.first() else {
        return Ok(GValue::Sequence(Vec::new()));
    };

    if let Node::Symbol(name, _) = head {
        if let Some(result) = eval_reserved_form(name, &items[1..], ctx, host).await {
            return result;
        }
    }

    let is_callee = matches!(
        head,
        Node::Symbol(_, _) | Node::AttributeAccess { .. } | Node::Execution { .. } | Node::ObjectRef(_, _)
    );

    if !is_callee {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(Box::pin(eval(item, ctx, host)).await?);
        }
        return Ok(GValue::Sequence(values));
    }

    let mut args = Vec::with_capacity(items.len() - 1);
    for item in &items[1..] {
        args.push(Box::pin(eval(item, ctx, host)).await?);
    }

    match head {
        Node::Symbol(name, name_span) => {
            if stdlib::is_builtin(name) {
                stdlib::call(name, args, ctx, host, *name_span).await
            } else if let Some(value) = ctx.lookup(name).cloned() {
                match value {
                    GValue::Source(_) | GValue::String(_) => {
                        let target = ExecutionTarget::Variable(name.clone());
                        invoke_execution(&target, *name_span, ctx, host, args).await
                    }
                    other => Ok(other),
                }
            } else {
                Err(GError::unresolved_callee(name.clone(), *name_span).into())
            }
        }
        Node::AttributeAccess { base, attr, span } => {
            let object = resolve_ref(base, ctx, host).await?;
            invoke_attribute(&object, attr, args, ctx, host).await.map_err(|e| {
                if let Signal::Error(GError::NotFound { .. }) = &e {
                    Signal::Error(GError::unresolved_callee(format!("{object}.{attr}"), *span))
                } else {
                    e
                }
            })
        }
        Node::Execution { target, span } => invoke_execution(target, *span, ctx, host, args).await,
        Node::ObjectRef(name, _) => {
            let object = host.get_object(name, ctx).await?;
            invoke_attribute(&object, "run", args, ctx, host).await
        }
        _ => unreachable!("non-callee heads are filtered above"),
    }
}

/// Handles the reserved forms that control evaluation of their own operands
/// rather than receiving pre-evaluated arguments. Returns `None` if `name`
/// is not a reserved form so the caller falls through to ordinary dispatch.
async fn eval_reserved_form(
    name: &str,
    raw_args: &[Node],
    ctx: &mut EvalContext,
    host: &dyn Host,
) -> Option<EvalResult> {
    match name {
        "if" => Some(eval_if(raw_args, ctx, host).await),
        "and" => Some(eval_and(raw_args, ctx, host).await),
        "or" => Some(eval_or(raw_args, ctx, host).await),
        "define" => Some(eval_define(raw_args, ctx, host).await),
        "return" => Some(eval_return(raw_args, ctx, host).await),
        "quote" => Some(eval_quote(raw_args)),
        _ => None,
    }
}

async fn eval_if(args: &[Node], ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    let [cond, then_branch, rest @ ..] = args else {
        return Err(GError::type_coercion("if requires a condition and a then-branch", crate::lexer::Span::new(0, 0)).into());
    };
    let cond_value = Box::pin(eval(cond, ctx, host)).await?;
    if cond_value.is_truthy() {
        Box::pin(eval(then_branch, ctx, host)).await
    } else if let Some(else_branch) = rest.first() {
        Box::pin(eval(else_branch, ctx, host)).await
    } else {
        Ok(GValue::Null)
    }
}

async fn eval_and(args: &[Node], ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    let mut last = GValue::Boolean(true);
    for arg in args {
        last = Box::pin(eval(arg, ctx, host)).await?;
        if !last.is_truthy() {
            return Ok(last);
        }
    }
    Ok(last)
}

async fn eval_or(args: &[Node], ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    let mut last = GValue::Boolean(false);
    for arg in args {
        last = Box::pin(eval(arg, ctx, host)).await?;
        if last.is_truthy() {
            return Ok(last);
        }
    }
    Ok(last)
}

async fn eval_define(args: &[Node], ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    let [name_node, value_node] = args else {
        return Err(GError::type_coercion("define requires a name and a value", crate::lexer::Span::new(0, 0)).into());
    };
    let name = match name_node {
        Node::Symbol(s, _) => s.clone(),
        other => {
            return Err(GError::type_coercion("define requires a symbol name", other.span()).into());
        }
    };
    let value = Box::pin(eval(value_node, ctx, host)).await?;
    ctx.define(name, value.clone());
    Ok(value)
}

async fn eval_return(args: &[Node], ctx: &mut EvalContext, host: &dyn Host) -> EvalResult {
    let value = match args.first() {
        Some(node) => Box::pin(eval(node, ctx, host)).await?,
        None => GValue::Null,
    };
    Err(Signal::Return(value))
}

fn eval_quote(args: &[Node]) -> EvalResult {
    // `quote` returns its argument's G source text unevaluated; since we
    // don't retain original source spans' text here, re-render via Display
    // is not meaningful for sub-trees, so quote is restricted to a single
    // symbol or literal argument capturing its literal/name form.
    match args.first() {
        Some(Node::Symbol(s, _)) => Ok(GValue::Source(s.clone())),
        Some(Node::Literal(Literal::String(s), _)) => Ok(GValue::Source(s.clone())),
        Some(other) => Ok(GValue::Source(format!("{other:?}"))),
        None => Ok(GValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Host;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;

    struct TestHost {
        attrs: Mutex<StdHashMap<(ObjectId, String), GValue>>,
        sent: Mutex<Vec<(ObjectId, GValue)>>,
        log: Mutex<Vec<String>>,
    }

    impl TestHost {
        fn new() -> Self {
            Self {
                attrs: Mutex::new(StdHashMap::new()),
                sent: Mutex::new(Vec::new()),
                log: Mutex::new(Vec::new()),
            }
        }

        fn with_attr(self, object: &str, name: &str, value: GValue) -> Self {
            self.attrs
                .lock()
                .unwrap()
                .insert((ObjectId::new(object), name.to_string()), value);
            self
        }
    }

    #[async_trait]
    impl Host for TestHost {
        async fn get_attr(&self, object: &ObjectId, name: &str) -> Result<Option<GValue>, GError> {
            Ok(self.attrs.lock().unwrap().get(&(object.clone(), name.to_string())).cloned())
        }

        async fn set_attr(&self, object: &ObjectId, name: &str, value: GValue) -> Result<(), GError> {
            self.attrs
                .lock()
                .unwrap()
                .insert((object.clone(), name.to_string()), value);
            Ok(())
        }

        async fn get_object(&self, reference: &str, ctx: &EvalContext) -> Result<ObjectId, GError> {
            match reference {
                "@this" => Ok(ctx.this.clone()),
                "@actor" => Ok(ctx.actor.clone()),
                "@executor" => Ok(ctx.executor.clone()),
                other => Ok(ObjectId::new(other)),
            }
        }

        async fn send(&self, target: &ObjectId, payload: GValue) -> Result<(), GError> {
            self.sent.lock().unwrap().push((target.clone(), payload));
            Ok(())
        }

        fn log(&self, message: &str) {
            self.log.lock().unwrap().push(message.to_string());
        }

        async fn load(&self, _: &str, _: &ObjectId, _: &str, _: &EvalContext) -> Result<(), GError> {
            Ok(())
        }

        async fn actor_has_role(&self, _: &ObjectId, _: &str) -> Result<bool, GError> {
            Ok(false)
        }
    }

    fn ctx() -> EvalContext {
        EvalContext::top_level(ObjectId::new("#room"), ObjectId::new("#alice"), ObjectId::new("#room"))
    }

    async fn run(source: &str, host: &TestHost) -> GValue {
        let node = crate::parser::parse(source).unwrap();
        let mut context = ctx();
        match Box::pin(eval(&node, &mut context, host)).await {
            Ok(v) => v,
            Err(Signal::Return(v)) => v,
            Err(Signal::Error(e)) => panic!("eval error: {e}"),
        }
    }

    #[tokio::test]
    async fn if_never_evaluates_the_untaken_branch() {
        let host = TestHost::new();
        let value = run("[if true \"yes\" [unknown]]", &host).await;
        assert_eq!(value, GValue::string("yes"));
    }

    #[tokio::test]
    async fn if_false_skips_the_then_branch() {
        let host = TestHost::new();
        let value = run("[if false [unknown] \"no\"]", &host).await;
        assert_eq!(value, GValue::string("no"));
    }

    #[tokio::test]
    async fn equals_is_reflexive() {
        let host = TestHost::new();
        let value = run("[equals 1 1]", &host).await;
        assert_eq!(value, GValue::Boolean(true));
    }

    #[tokio::test]
    async fn get_attr_on_absent_name_returns_null() {
        let host = TestHost::new();
        let value = run("[get_attr #room \"nothing\"]", &host).await;
        assert_eq!(value, GValue::Null);
    }

    #[tokio::test]
    async fn set_attr_then_get_attr_sees_the_write() {
        let host = TestHost::new();
        let value = run(
            "[if [set_attr #room \"color\" \"red\"] [get_attr #room \"color\"] \"no\"]",
            &host,
        )
        .await;
        assert_eq!(value, GValue::string("red"));
    }

    #[tokio::test]
    async fn define_binds_in_current_frame() {
        let host = TestHost::new();
        let node = crate::parser::parse("[define x 5]").unwrap();
        let mut context = ctx();
        eval(&node, &mut context, &host).await.unwrap();
        assert_eq!(context.lookup("x"), Some(&GValue::Number(5.0)));
    }

    #[tokio::test]
    async fn send_literal_payload_is_delivered_verbatim() {
        let host = TestHost::new();
        run("[send #bob \"hi\"]", &host).await;
        let sent = host.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, GValue::string("hi"));
    }
}
