//! Background loop that publishes scheduled posts when they come due.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::store::PostStore;
use super::publisher::Publisher;

/// Runs forever; spawn it with `tokio::spawn`. Each tick picks up every
/// scheduled post whose time has passed and publishes it. Failures land the
/// post in `failed` (via the publisher) without affecting the rest of the
/// batch.
pub async fn start_background_scheduler(
    posts: Arc<dyn PostStore>,
    publisher: Publisher,
    check_interval_secs: u64,
) {
    println!(
        "[scheduler] Checking for due posts every {}s",
        check_interval_secs
    );
    let mut interval = tokio::time::interval(Duration::from_secs(check_interval_secs));

    loop {
        interval.tick().await;

        let due = match posts.list_due_scheduled(Utc::now()).await {
            Ok(due) => due,
            Err(e) => {
                eprintln!("[scheduler] Failed to query due posts: {}", e);
                continue;
            }
        };

        for post in due {
            println!("[scheduler] Publishing scheduled post {}", post.id);
            match publisher.publish(post.user_id, post.id).await {
                Ok(published) => println!(
                    "[scheduler] Post {} published as {}",
                    published.id,
                    published.remote_post_id.as_deref().unwrap_or("?")
                ),
                Err(e) => eprintln!("[scheduler] Post {} failed: {}", post.id, e),
            }
        }
    }
}
