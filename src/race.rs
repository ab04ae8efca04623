//! First-settled-of-N combinator.

use futures::future::{BoxFuture, select_all};

/// Resolves with the value of whichever contender settles first.
///
/// The remaining contenders are dropped on return, which detaches whatever
/// listener or timer they were holding. An empty contender list never resolves.
pub async fn first_settled<T>(contenders: Vec<BoxFuture<'static, T>>) -> T {
    if contenders.is_empty() {
        return std::future::pending().await;
    }
    let (value, _index, _rest) = select_all(contenders).await;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt as _;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn earliest_contender_wins() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            "slow"
        }
        .boxed();
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "fast"
        }
        .boxed();
        assert_eq!(first_settled(vec![slow, fast]).await, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_contenders_do_not_block() {
        let never = std::future::pending::<u8>().boxed();
        let later = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        }
        .boxed();
        assert_eq!(first_settled(vec![never, later]).await, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn losers_are_dropped() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let loser = async move {
            let _tx = tx;
            std::future::pending::<u8>().await
        }
        .boxed();
        let winner = async { 1u8 }.boxed();
        assert_eq!(first_settled(vec![loser, winner]).await, 1);
        // The loser held the sender; dropping it closes the channel.
        assert!(rx.await.is_err());
    }
}
