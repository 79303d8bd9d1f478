//! Method binding. Callables are registered against (object, method)
//! pairs when the address space is built, never patched in afterwards.

use std::panic::{catch_unwind, AssertUnwindSafe};

use hashbrown::HashMap;
use log::error;
use uastack_types::{NodeId, StatusCode, Variant};

/// Context handed to a method invocation.
pub struct MethodContext {
    /// Numeric id of the calling session.
    pub session_id: u32,
    /// The object the method was called on.
    pub object_id: NodeId,
    /// The method node.
    pub method_id: NodeId,
}

/// A server-side method implementation.
pub trait MethodCallable: Send + Sync {
    /// Invoke the method. Input arguments have already been validated
    /// against the method's InputArguments property.
    fn invoke(
        &mut self,
        context: &MethodContext,
        input_arguments: &[Variant],
    ) -> Result<Vec<Variant>, StatusCode>;
}

impl<F> MethodCallable for F
where
    F: FnMut(&MethodContext, &[Variant]) -> Result<Vec<Variant>, StatusCode> + Send + Sync,
{
    fn invoke(
        &mut self,
        context: &MethodContext,
        input_arguments: &[Variant],
    ) -> Result<Vec<Variant>, StatusCode> {
        self(context, input_arguments)
    }
}

#[derive(Default)]
pub(super) struct MethodRegistry {
    callables: HashMap<(NodeId, NodeId), Box<dyn MethodCallable>>,
}

impl MethodRegistry {
    pub(super) fn register(
        &mut self,
        object_id: NodeId,
        method_id: NodeId,
        callable: Box<dyn MethodCallable>,
    ) {
        self.callables.insert((object_id, method_id), callable);
    }

    pub(super) fn invoke(
        &mut self,
        context: &MethodContext,
        input_arguments: &[Variant],
    ) -> Result<Vec<Variant>, StatusCode> {
        let key = (context.object_id.clone(), context.method_id.clone());
        let Some(callable) = self.callables.get_mut(&key) else {
            return Err(StatusCode::BadMethodInvalid);
        };
        // A panicking functor must not take the session down with it.
        match catch_unwind(AssertUnwindSafe(|| {
            callable.invoke(context, input_arguments)
        })) {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Method {} on {} panicked, reporting an internal error",
                    context.method_id, context.object_id
                );
                Err(StatusCode::BadInternalError)
            }
        }
    }
}
