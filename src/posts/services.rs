use uuid::Uuid;

use crate::posts::{repo::PostRepo, repo_types::PostPage};

/// Loads page `page` (1-based) of an author's posts.
///
/// Returns `None` for a page that cannot exist: below 1, or past the last
/// page. Page 1 of an author without posts is an empty page, not `None`.
pub async fn author_page(
    posts: &dyn PostRepo,
    author_id: Uuid,
    page: i64,
    per_page: i64,
) -> anyhow::Result<Option<PostPage>> {
    if page < 1 {
        return Ok(None);
    }
    let total = posts.count_by_author(author_id).await?;
    let offset = (page - 1).saturating_mul(per_page);
    if page > 1 && offset >= total {
        return Ok(None);
    }
    let items = posts.list_by_author(author_id, per_page, offset).await?;
    Ok(Some(PostPage::new(items, page, per_page, total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryPosts;
    use time::{Duration, OffsetDateTime};

    fn seeded(author: Uuid, n: i64) -> MemoryPosts {
        let posts = MemoryPosts::default();
        let base = OffsetDateTime::now_utc() - Duration::days(30);
        for i in 0..n {
            posts.insert(author, &format!("post {i}"), base + Duration::hours(i));
        }
        posts
    }

    #[tokio::test]
    async fn newest_first_and_bounded_by_page_size() {
        let author = Uuid::new_v4();
        let posts = seeded(author, 7);
        posts.insert(Uuid::new_v4(), "someone else", OffsetDateTime::now_utc());

        let first = author_page(&posts, author, 1, 3).await.unwrap().unwrap();
        assert_eq!(first.total, 7);
        assert_eq!(first.pages, 3);
        let titles: Vec<_> = first.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["post 6", "post 5", "post 4"]);

        let last = author_page(&posts, author, 3, 3).await.unwrap().unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].title, "post 0");
        assert!(!last.has_next);
    }

    #[tokio::test]
    async fn out_of_range_pages_are_none() {
        let author = Uuid::new_v4();
        let posts = seeded(author, 3);
        assert!(author_page(&posts, author, 0, 3).await.unwrap().is_none());
        assert!(author_page(&posts, author, -2, 3).await.unwrap().is_none());
        assert!(author_page(&posts, author, 2, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_page_of_empty_author_is_empty() {
        let posts = MemoryPosts::default();
        let page = author_page(&posts, Uuid::new_v4(), 1, 3)
            .await
            .unwrap()
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.pages, 0);
    }
}
