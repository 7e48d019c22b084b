mod support;

use kumoscan::application::comments::{CommentError, PostCommentCommand};
use kumoscan::application::favorites::{FavoriteError, FavoriteService};
use kumoscan::application::ratings::RatingError;
use kumoscan::application::reading::ReadingError;
use kumoscan::domain::types::UserRole;
use uuid::Uuid;

use support::{
    MemoryStore, admin_viewer, comment_service, rating_service, reading_service, sample_chapter,
    sample_title, sample_user, viewer,
};

#[tokio::test]
async fn ratings_follow_running_average() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Rated", 1));
    let ratings = rating_service(&store);

    let first = ratings
        .submit_rating(title_id, "alice", 4)
        .await
        .expect("first rating");
    assert_eq!((first.average, first.count), (4.0, 1));

    let second = ratings
        .submit_rating(title_id, "bob", 2)
        .await
        .expect("second rating");
    assert_eq!((second.average, second.count), (3.0, 2));

    let updated = ratings
        .submit_rating(title_id, "alice", 5)
        .await
        .expect("updated rating");
    assert_eq!((updated.average, updated.count), (3.5, 2));
    assert_eq!(updated.user_stars, Some(5));

    let summary = ratings
        .summary(title_id, Some("alice"))
        .await
        .expect("summary");
    assert_eq!(summary.user_stars, Some(5));
    assert_eq!(summary.breakdown, [0, 1, 0, 0, 1]);

    let stored = store.title(title_id).expect("title");
    assert_eq!((stored.rating, stored.ratings_count), (3.5, 2));
}

#[tokio::test]
async fn zero_stars_withdraws_a_rating() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Rated", 1));
    let ratings = rating_service(&store);

    ratings.submit_rating(title_id, "alice", 4).await.expect("alice");
    ratings.submit_rating(title_id, "bob", 2).await.expect("bob");

    let withdrawn = ratings
        .submit_rating(title_id, "bob", 0)
        .await
        .expect("withdrawal");
    assert_eq!((withdrawn.average, withdrawn.count), (4.0, 1));
    assert_eq!(withdrawn.user_stars, None);

    let summary = ratings.summary(title_id, Some("bob")).await.expect("summary");
    assert_eq!(summary.user_stars, None);
}

#[tokio::test]
async fn out_of_range_or_unknown_ratings_are_refused() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Rated", 1));
    let ratings = rating_service(&store);

    let err = ratings
        .submit_rating(title_id, "alice", 6)
        .await
        .expect_err("six stars");
    assert!(matches!(err, RatingError::Domain(_)));

    let err = ratings
        .submit_rating(Uuid::new_v4(), "alice", 3)
        .await
        .expect_err("unknown title");
    assert!(matches!(err, RatingError::NotFound));
}

#[tokio::test]
async fn comment_threads_list_newest_parents_with_oldest_replies_first() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Talked About", 1));
    let chapter_id = store.insert_chapter(sample_chapter(title_id, 1));
    let comments = comment_service(&store);
    let reader = viewer("reader-1");

    let post = |text: &str, parent_id: Option<Uuid>| PostCommentCommand {
        title_id,
        chapter_id,
        text: text.to_string(),
        parent_id,
    };

    let older = comments
        .post_comment(&reader, post("first!", None))
        .await
        .expect("older parent");
    let newer = comments
        .post_comment(&reader, post("  second  ", None))
        .await
        .expect("newer parent");
    let reply_a = comments
        .post_comment(&reader, post("reply a", Some(older.id)))
        .await
        .expect("reply a");
    let reply_b = comments
        .post_comment(&reader, post("reply b", Some(older.id)))
        .await
        .expect("reply b");
    assert_eq!(newer.text, "second");

    let threads = comments
        .load_comments(title_id, chapter_id)
        .await
        .expect("threads");
    let parents: Vec<Uuid> = threads.iter().map(|thread| thread.comment.id).collect();
    assert_eq!(parents, vec![newer.id, older.id]);
    assert!(threads[0].replies.is_empty());
    let replies: Vec<Uuid> = threads[1].replies.iter().map(|reply| reply.id).collect();
    assert_eq!(replies, vec![reply_a.id, reply_b.id]);

    let nested = comments
        .post_comment(&reader, post("too deep", Some(reply_a.id)))
        .await
        .expect_err("nested reply");
    assert!(matches!(nested, CommentError::Domain(_)));
}

#[tokio::test]
async fn comments_need_an_existing_chapter_and_text() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Quiet", 1));
    let chapter_id = store.insert_chapter(sample_chapter(title_id, 1));
    let comments = comment_service(&store);
    let reader = viewer("reader-1");

    let err = comments
        .post_comment(
            &reader,
            PostCommentCommand {
                title_id,
                chapter_id: Uuid::new_v4(),
                text: "hello".into(),
                parent_id: None,
            },
        )
        .await
        .expect_err("missing chapter");
    assert!(matches!(err, CommentError::ChapterNotFound));

    let err = comments
        .post_comment(
            &reader,
            PostCommentCommand {
                title_id,
                chapter_id,
                text: "   ".into(),
                parent_id: None,
            },
        )
        .await
        .expect_err("blank text");
    assert!(matches!(err, CommentError::Domain(_)));
}

#[tokio::test]
async fn likes_are_idempotent_per_user() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Liked", 1));
    let chapter_id = store.insert_chapter(sample_chapter(title_id, 1));
    let comments = comment_service(&store);
    let author = viewer("author");
    let fan = viewer("fan");

    let comment = comments
        .post_comment(
            &author,
            PostCommentCommand {
                title_id,
                chapter_id,
                text: "like me".into(),
                parent_id: None,
            },
        )
        .await
        .expect("comment");

    comments.like_comment(&fan, comment.id, true).await.expect("like");
    let liked = comments
        .like_comment(&fan, comment.id, true)
        .await
        .expect("like again");
    assert_eq!(liked.likes, 1);
    assert!(liked.is_liked_by("fan"));

    let unliked = comments
        .like_comment(&fan, comment.id, false)
        .await
        .expect("unlike");
    assert_eq!(unliked.likes, 0);

    let err = comments
        .like_comment(&fan, Uuid::new_v4(), true)
        .await
        .expect_err("missing comment");
    assert!(matches!(err, CommentError::CommentNotFound));
}

#[tokio::test]
async fn only_authors_and_admins_delete_comments() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Moderated", 1));
    let chapter_id = store.insert_chapter(sample_chapter(title_id, 1));
    let comments = comment_service(&store);
    let author = viewer("author");

    let parent = comments
        .post_comment(
            &author,
            PostCommentCommand {
                title_id,
                chapter_id,
                text: "parent".into(),
                parent_id: None,
            },
        )
        .await
        .expect("parent");
    comments
        .post_comment(
            &viewer("someone"),
            PostCommentCommand {
                title_id,
                chapter_id,
                text: "reply".into(),
                parent_id: Some(parent.id),
            },
        )
        .await
        .expect("reply");

    let err = comments
        .delete_comment(&viewer("stranger"), parent.id)
        .await
        .expect_err("stranger");
    assert!(matches!(err, CommentError::Forbidden));

    comments
        .delete_comment(&admin_viewer("moderator"), parent.id)
        .await
        .expect("admin delete");
    let threads = comments
        .load_comments(title_id, chapter_id)
        .await
        .expect("threads");
    assert!(threads.is_empty());
}

#[tokio::test]
async fn progress_keeps_the_last_opened_chapter() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Serial", 1));
    let chapter_ids: Vec<Uuid> = (1..=5)
        .map(|number| store.insert_chapter(sample_chapter(title_id, number)))
        .collect();
    let reading = reading_service(&store);
    let reader = viewer("reader-1");

    reading
        .open_chapter(title_id, chapter_ids[4], Some(&reader))
        .await
        .expect("chapter 5");
    let view = reading
        .open_chapter(title_id, chapter_ids[2], Some(&reader))
        .await
        .expect("chapter 3");

    assert_eq!(view.chapter.chapter_number, 3);
    assert_eq!(view.previous.map(|link| link.chapter_number), Some(2));
    assert_eq!(view.next.map(|link| link.chapter_number), Some(4));
    assert_eq!(view.chapters.len(), 5);

    let progress = reading
        .progress_for("reader-1", title_id)
        .await
        .expect("progress lookup")
        .expect("progress recorded");
    assert_eq!(progress.last_chapter_number, 3);
    assert_eq!(progress.last_chapter_id, chapter_ids[2]);
    assert_eq!(progress.title_name, "Serial");

    let history = reading
        .reading_history("reader-1", 20)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn anonymous_reads_count_views_without_progress() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Open", 1));
    let chapter = sample_chapter(title_id, 1);
    let chapter_id = store.insert_chapter(chapter);
    let reading = reading_service(&store);

    let view = reading
        .open_chapter(title_id, chapter_id, None)
        .await
        .expect("anonymous read");
    assert!(view.previous.is_none());
    assert!(view.next.is_none());
    assert_eq!(
        store.chapters_of(title_id).first().map(|c| c.views),
        Some(1)
    );

    let err = reading
        .open_chapter(Uuid::new_v4(), chapter_id, None)
        .await
        .expect_err("wrong title");
    assert!(matches!(err, ReadingError::TitleNotFound));

    let other_title = store.insert_title(sample_title("Other", 2));
    let err = reading
        .open_chapter(other_title, chapter_id, None)
        .await
        .expect_err("chapter of another title");
    assert!(matches!(err, ReadingError::ChapterNotFound));
}

#[tokio::test]
async fn favorites_toggle_idempotently_and_move_the_counter() {
    let store = MemoryStore::new();
    let title_id = store.insert_title(sample_title("Beloved", 1));
    store.insert_user(sample_user("reader-1", UserRole::User));
    let favorites = FavoriteService::new(store.clone(), store.clone());
    let reader = viewer("reader-1");

    let added = favorites
        .set_favorite(&reader, title_id, true)
        .await
        .expect("add");
    assert!(added.changed);
    assert_eq!(added.favorites_count, 1);

    let repeated = favorites
        .set_favorite(&reader, title_id, true)
        .await
        .expect("repeat");
    assert!(!repeated.changed);
    assert_eq!(repeated.favorites_count, 1);
    assert!(
        favorites
            .is_favorite("reader-1", title_id)
            .await
            .expect("lookup")
    );

    let removed = favorites
        .set_favorite(&reader, title_id, false)
        .await
        .expect("remove");
    assert!(removed.changed);
    assert_eq!(removed.favorites_count, 0);

    let err = favorites
        .set_favorite(&reader, Uuid::new_v4(), true)
        .await
        .expect_err("unknown title");
    assert!(matches!(err, FavoriteError::TitleNotFound));
}
