//! Repository behaviour against a real Postgres. Requires `DATABASE_URL`.

use sqlx::PgPool;
use yatube::{
    application::{
        pagination::PageWindow,
        repos::{
            CommentsRepo, CreateCommentCommand, CreateGroupCommand, CreatePostCommand,
            CreateUserCommand, FollowsRepo, GroupsRepo, HealthRepo, PostScope, PostsRepo,
            PostsWriteRepo, RepoError, UpdatePostCommand, UsersRepo,
        },
    },
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::db::PostgresRepositories,
};

const WINDOW: PageWindow = PageWindow {
    limit: 10,
    offset: 0,
};

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserCommand {
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect("create user")
}

async fn group(repos: &PostgresRepositories, slug: &str) -> GroupRecord {
    repos
        .create_group(CreateGroupCommand {
            title: slug.to_uppercase(),
            description: String::new(),
            slug: slug.to_string(),
        })
        .await
        .expect("create group")
}

async fn post(
    repos: &PostgresRepositories,
    author: &UserRecord,
    text: &str,
    group: Option<&GroupRecord>,
) -> PostRecord {
    repos
        .create_post(CreatePostCommand {
            text: text.to_string(),
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        })
        .await
        .expect("create post")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn scoped_listings_are_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    let cats = group(&repos, "cats").await;

    let first = post(&repos, &leo, "first", Some(&cats)).await;
    let second = post(&repos, &anna, "second", None).await;
    let third = post(&repos, &leo, "third", None).await;

    let all = repos.list_posts(PostScope::All, WINDOW).await.expect("list");
    let ids: Vec<i64> = all.iter().map(|entry| entry.post.id).collect();
    assert_eq!(ids, [third.id, second.id, first.id]);

    assert_eq!(repos.count_posts(PostScope::Author(leo.id)).await.expect("count"), 2);
    assert_eq!(repos.count_posts(PostScope::Group(cats.id)).await.expect("count"), 1);

    let page = repos
        .list_posts(
            PostScope::All,
            PageWindow {
                limit: 2,
                offset: 2,
            },
        )
        .await
        .expect("second page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].post.id, first.id);

    let entry = repos.find_post(first.id).await.expect("find").expect("exists");
    assert_eq!(entry.author.expect("author").username, "leo");
    assert_eq!(entry.group.expect("group").slug, "cats");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_keeps_publication_date(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let created = post(&repos, &leo, "draft", None).await;

    let updated = repos
        .update_post(UpdatePostCommand {
            id: created.id,
            text: "final".to_string(),
            group_id: None,
            image: Some("posts/x.gif".to_string()),
        })
        .await
        .expect("update");
    assert_eq!(updated.text, "final");
    assert_eq!(updated.pub_date, created.pub_date);
    assert_eq!(updated.image.as_deref(), Some("posts/x.gif"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicates_map_to_repo_errors(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    user(&repos, "leo").await;
    let err = repos
        .create_user(CreateUserCommand {
            username: "leo".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .expect_err("duplicate username");
    assert!(matches!(err, RepoError::Duplicate { .. }));

    group(&repos, "cats").await;
    let err = repos
        .create_group(CreateGroupCommand {
            title: "Other".to_string(),
            description: String::new(),
            slug: "cats".to_string(),
        })
        .await
        .expect_err("duplicate slug");
    assert!(matches!(err, RepoError::Duplicate { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn follow_edges_are_unique(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let anna = user(&repos, "anna").await;
    let leo = user(&repos, "leo").await;
    let carl = user(&repos, "carl").await;

    assert!(repos.follow(anna.id, leo.id).await.expect("follow"));
    assert!(!repos.follow(anna.id, leo.id).await.expect("follow again"));
    assert!(repos.is_following(anna.id, leo.id).await.expect("check"));

    let news = post(&repos, &leo, "news", None).await;
    post(&repos, &carl, "noise", None).await;
    let feed = repos
        .list_posts(PostScope::FollowedBy(anna.id), WINDOW)
        .await
        .expect("feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post.id, news.id);

    assert!(repos.unfollow(anna.id, leo.id).await.expect("unfollow"));
    assert!(!repos.unfollow(anna.id, leo.id).await.expect("unfollow again"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn referential_actions_follow_schema(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let leo = user(&repos, "leo").await;
    let anna = user(&repos, "anna").await;
    let cats = group(&repos, "cats").await;
    let kept = post(&repos, &leo, "kept", Some(&cats)).await;
    let doomed = post(&repos, &anna, "doomed", None).await;

    repos
        .create_comment(CreateCommentCommand {
            post_id: doomed.id,
            author_id: leo.id,
            text: "bye".to_string(),
        })
        .await
        .expect("comment");
    assert_eq!(repos.list_for_post(doomed.id).await.expect("comments").len(), 1);

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(doomed.id)
        .execute(&pool)
        .await
        .expect("delete post");
    assert!(repos.list_for_post(doomed.id).await.expect("comments").is_empty());

    sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(cats.id)
        .execute(&pool)
        .await
        .expect("delete group");
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(leo.id)
        .execute(&pool)
        .await
        .expect("delete user");

    let orphan = repos.find_post(kept.id).await.expect("find").expect("post survives");
    assert_eq!(orphan.post.author_id, None);
    assert_eq!(orphan.post.group_id, None);
    assert!(orphan.author.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn health_check_pings_database(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos.ping().await.expect("database answers");
}
