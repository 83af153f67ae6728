use mockito::{Matcher, Server};
use serde_json::json;

use super::GitHubProvider;
use crate::auth::Token;
use crate::changes::fixtures::at;
use crate::changes::ChangeStatus;

fn pull_json(server: &str, number: u64, updated: &str, branch: &str) -> serde_json::Value {
    json!({
        "id": 500 + number,
        "number": number,
        "state": "closed",
        "user": {"login": "jdoe"},
        "created_at": "2018-09-20T10:00:00Z",
        "updated_at": updated,
        "merged_at": updated,
        "html_url": format!("{server}/foo/api/pull/{number}"),
        "commits_url": format!("{server}/api/v3/repos/foo/api/pulls/{number}/commits"),
        "comments_url": format!("{server}/api/v3/repos/foo/api/issues/{number}/comments"),
        "base": {"ref": branch}
    })
}

#[tokio::test]
async fn test_gather_filters_branches_and_stops_at_window_start() {
    let mut server = Server::new_async().await;
    let url = server.url();

    let pulls = json!([
        pull_json(&url, 3, "2018-09-25T12:00:00Z", "master"),
        pull_json(&url, 2, "2018-09-25T11:00:00Z", "stable/pike"),
        pull_json(&url, 1, "2018-09-01T11:00:00Z", "master"),
    ]);
    let _pulls = server
        .mock("GET", "/api/v3/repos/foo/api/pulls")
        .match_query(Matcher::Any)
        .with_body(pulls.to_string())
        .create_async()
        .await;
    let commits = server
        .mock("GET", "/api/v3/repos/foo/api/pulls/3/commits")
        .match_query(Matcher::UrlEncoded("per_page".into(), "100".into()))
        .with_body(
            json!([{"sha": "abc", "commit": {"committer": {"date": "2018-09-24T10:00:00Z"}}}])
                .to_string(),
        )
        .create_async()
        .await;
    let comments = server
        .mock("GET", "/api/v3/repos/foo/api/issues/3/comments")
        .match_query(Matcher::Any)
        .with_body(
            json!([{
                "id": 42,
                "body": "Build succeeded (check pipeline).\n\n- https://logs.example.com/check/foo/api/3/abc/api-unit : SUCCESS in 1m 05s",
                "created_at": "2018-09-24T11:00:00Z",
                "user": {"login": "zuul"}
            }])
            .to_string(),
        )
        .create_async()
        .await;
    let untouched = server
        .mock("GET", "/api/v3/repos/foo/api/pulls/1/commits")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let provider = GitHubProvider::new(
        &url,
        Some(Token::from("secret")),
        true,
        vec!["master".to_string()],
    )
    .unwrap();
    let gathered = provider
        .gather(&["foo/api".to_string()], at(2018, 9, 24, 0, 0))
        .await
        .unwrap();

    assert!(gathered.not_found.is_empty());
    assert_eq!(gathered.changes.len(), 1);

    let change = &gathered.changes[0];
    assert_eq!(change.number, 3);
    assert_eq!(change.project, "foo/api");
    assert_eq!(change.status, ChangeStatus::Merged);
    assert_eq!(change.revisions[0].messages[0].id, "42");
    let runs = change.ci_runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].jobs[0].name, "api-unit");
    assert_eq!(runs[0].jobs[0].duration_secs, Some(65));

    commits.assert_async().await;
    comments.assert_async().await;
    untouched.assert_async().await;
}

#[tokio::test]
async fn test_gather_collects_missing_repositories() {
    let mut server = Server::new_async().await;
    let _missing = server
        .mock("GET", "/api/v3/repos/foo/private/pulls")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let _empty = server
        .mock("GET", "/api/v3/repos/foo/public/pulls")
        .match_query(Matcher::Any)
        .with_body("[]")
        .create_async()
        .await;

    let provider = GitHubProvider::new(&server.url(), None, true, vec![]).unwrap();
    let gathered = provider
        .gather(
            &["foo/private".to_string(), "foo/public".to_string()],
            at(2018, 9, 24, 0, 0),
        )
        .await
        .unwrap();

    assert_eq!(gathered.not_found, vec!["foo/private".to_string()]);
    assert!(gathered.changes.is_empty());
}
