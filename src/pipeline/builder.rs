//! Pipe composition.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::pipeline::{Filter, Pipe, PipeError, ReceiveContext, SharedPipe};

/// Composes filters in front of a terminal pipe.
///
/// Filters run in the order they were added.
#[derive(Default)]
pub struct PipeBuilder {
    filters: Vec<Arc<dyn Filter>>,
}

impl PipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Finish the pipe with `terminal` as the last stage.
    pub fn build<P: Pipe + 'static>(self, terminal: P) -> SharedPipe {
        self.build_shared(Arc::new(terminal))
    }

    /// Finish the pipe in front of an already shared terminal.
    pub fn build_shared(self, terminal: SharedPipe) -> SharedPipe {
        self.filters
            .into_iter()
            .rev()
            .fold(terminal, |next, filter| -> SharedPipe {
                Arc::new(FilterPipe { filter, next })
            })
    }
}

/// One filter bound to the rest of the pipe.
pub(crate) struct FilterPipe {
    filter: Arc<dyn Filter>,
    next: SharedPipe,
}

impl FilterPipe {
    pub(crate) fn new(filter: Arc<dyn Filter>, next: SharedPipe) -> Self {
        Self { filter, next }
    }
}

impl Pipe for FilterPipe {
    fn send<'a>(&'a self, context: &'a mut ReceiveContext) -> BoxFuture<'a, Result<(), PipeError>> {
        self.filter.send(context, self.next.as_ref())
    }
}

/// Terminal pipe backed by a synchronous closure.
pub struct FnPipe<F>(F);

impl<F> FnPipe<F>
where
    F: Fn(&mut ReceiveContext) -> Result<(), PipeError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Pipe for FnPipe<F>
where
    F: Fn(&mut ReceiveContext) -> Result<(), PipeError> + Send + Sync,
{
    fn send<'a>(&'a self, context: &'a mut ReceiveContext) -> BoxFuture<'a, Result<(), PipeError>> {
        future::ready((self.0)(context)).boxed()
    }
}

/// Terminal pipe that accepts and drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardPipe;

impl Pipe for DiscardPipe {
    fn send<'a>(&'a self, _context: &'a mut ReceiveContext) -> BoxFuture<'a, Result<(), PipeError>> {
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::InputAddress;
    use std::sync::Mutex;

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Filter for Tag {
        fn send<'a>(
            &'a self,
            context: &'a mut ReceiveContext,
            next: &'a dyn Pipe,
        ) -> BoxFuture<'a, Result<(), PipeError>> {
            async move {
                self.1.lock().unwrap().push(self.0);
                next.send(context).await
            }
            .boxed()
        }
    }

    struct Reject;

    impl Filter for Reject {
        fn send<'a>(
            &'a self,
            _context: &'a mut ReceiveContext,
            _next: &'a dyn Pipe,
        ) -> BoxFuture<'a, Result<(), PipeError>> {
            future::ready(Err(PipeError::Rejected("nope".into()))).boxed()
        }
    }

    fn context() -> ReceiveContext {
        ReceiveContext::new(InputAddress::parse("loopback://localhost/q").unwrap(), "m")
    }

    #[tokio::test]
    async fn filters_run_in_insertion_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let terminal_seen = Arc::clone(&seen);

        let pipe = PipeBuilder::new()
            .filter(Tag("first", Arc::clone(&seen)))
            .filter(Tag("second", Arc::clone(&seen)))
            .build(FnPipe::new(move |_ctx: &mut ReceiveContext| {
                terminal_seen.lock().unwrap().push("consumer");
                Ok(())
            }));

        pipe.send(&mut context()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "consumer"]);
    }

    #[tokio::test]
    async fn filter_can_short_circuit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipe = PipeBuilder::new()
            .filter(Reject)
            .filter(Tag("after", Arc::clone(&seen)))
            .build(DiscardPipe);

        let err = pipe.send(&mut context()).await.unwrap_err();
        assert_eq!(err.kind(), "rejected");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn consumer_can_mutate_context() {
        let pipe = PipeBuilder::new().build(FnPipe::new(|ctx: &mut ReceiveContext| {
            ctx.set_header("handled", "yes");
            Ok(())
        }));

        let mut ctx = context();
        pipe.send(&mut ctx).await.unwrap();
        assert_eq!(ctx.header("handled"), Some("yes"));
    }
}
