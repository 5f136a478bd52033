use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::{self, Handle, RuntimeFlavor};

static RUNTIME: Lazy<runtime::Runtime> = Lazy::new(|| {
    runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("greentic-gateway-rt")
        .build()
        .expect("build greentic-gateway runtime")
});

/// Drive a future to completion from synchronous code without nesting runtimes.
///
/// Inside a multi-threaded runtime the current worker is handed over with
/// `block_in_place`. A current-thread runtime cannot give up its only worker,
/// so the future is moved to a scoped helper thread backed by the shared
/// fallback runtime instead.
pub fn sync_await<F>(fut: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(fut))
        }
        Ok(_) => std::thread::scope(|scope| {
            match scope.spawn(|| RUNTIME.block_on(fut)).join() {
                Ok(output) => output,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }),
        Err(_) => RUNTIME.block_on(fut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_outside_of_a_runtime() {
        assert_eq!(sync_await(async { 40 + 2 }), 42);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn runs_inside_multi_thread_runtime() {
        let value = sync_await(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            "done"
        });
        assert_eq!(value, "done");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn runs_inside_current_thread_runtime() {
        let value = sync_await(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            7u8
        });
        assert_eq!(value, 7);
    }
}
