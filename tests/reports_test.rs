mod common;

use common::{
    added_by, joined_alone, joined_via_link, setup_db, user, CountingProvider, FakeMembership,
    RecordingReplies, CHAT,
};
use invite_tally::db::entities::invites::JoinMethod;
use invite_tally::services::admin::ChatScope;
use invite_tally::services::attribution::MemberStatus;
use invite_tally::services::config::TrackingSettings;
use invite_tally::services::reports::{CommandOutcome, TargetRef};
use invite_tally::Data;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const ADMIN: i64 = 50;

struct Harness {
    data: Data,
    provider: Arc<CountingProvider>,
    membership: Arc<FakeMembership>,
    replies: Arc<RecordingReplies>,
}

async fn harness() -> Harness {
    let provider = CountingProvider::new(setup_db().await);
    let membership = Arc::new(FakeMembership::default().with(ADMIN, MemberStatus::Administrator));
    let replies = Arc::new(RecordingReplies::default());

    let data = Data::new(
        provider.clone(),
        TrackingSettings::default(),
        replies.clone(),
        membership.clone(),
    );

    Harness {
        data,
        provider,
        membership,
        replies,
    }
}

fn by_token(token: &str) -> TargetRef {
    TargetRef {
        reply_to: None,
        token: Some(token.to_string()),
    }
}

#[tokio::test]
async fn test_direct_add_is_credited() {
    let h = harness().await;

    h.data
        .tracker
        .handle(&added_by(user(2, "bob"), user(1, "alice")), 100)
        .await
        .unwrap();

    assert_eq!(
        h.data.reports.my_invites(CHAT, 1).await,
        CommandOutcome::MyInvites {
            count: 1,
            position: Some(1)
        }
    );

    let CommandOutcome::Leaderboard(entries) = h.data.reports.top_inviters(CHAT, None).await else {
        panic!("expected a leaderboard");
    };
    let lines: Vec<(&str, i64)> = entries
        .iter()
        .map(|e| (e.display_name.as_str(), e.count))
        .collect();
    assert_eq!(lines, vec![("@alice", 1)]);

    let CommandOutcome::JoinInfo(record) = h.data.reports.who_added(CHAT, &by_token("2")).await
    else {
        panic!("expected a join record");
    };
    assert_eq!(record.method, JoinMethod::Added);
    assert_eq!(record.inviter_user_id, Some(1));
}

#[tokio::test]
async fn test_who_added_reports_invite_link() {
    let h = harness().await;

    h.data
        .tracker
        .handle(
            &joined_via_link(user(3, "carol"), "https://discord.gg/xyz", user(1, "alice")),
            100,
        )
        .await
        .unwrap();

    let outcome = h.data.reports.who_added(CHAT, &by_token("@carol")).await;
    let CommandOutcome::JoinInfo(record) = &outcome else {
        panic!("expected a join record, got {:?}", outcome);
    };
    assert_eq!(record.method, JoinMethod::InviteLink);
    assert_eq!(record.inviter_user_id, Some(1));
    assert_eq!(record.invite_link.as_deref(), Some("https://discord.gg/xyz"));

    let text = outcome.to_string();
    assert!(text.contains("https://discord.gg/xyz"));
    assert!(text.contains("@alice"));

    // Replying to the member's message works the same way.
    let reply = TargetRef {
        reply_to: Some(3),
        token: None,
    };
    assert_eq!(h.data.reports.who_added(CHAT, &reply).await, outcome);
}

#[tokio::test]
async fn test_ranking_denied_for_members_without_queries() {
    let h = harness().await;

    let before = h.provider.connections();
    let outcome = h.data.reports.ranking(ChatScope::Group(CHAT), 7, None).await;

    assert_eq!(outcome, CommandOutcome::AccessDenied);
    assert_eq!(h.provider.connections(), before);
    assert_eq!(h.membership.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ranking_allowed_for_admins_and_direct_chats() {
    let h = harness().await;

    h.data
        .tracker
        .handle(&added_by(user(2, "bob"), user(1, "alice")), 100)
        .await
        .unwrap();

    assert!(matches!(
        h.data.reports.ranking(ChatScope::Group(CHAT), ADMIN, None).await,
        CommandOutcome::Leaderboard(_)
    ));

    // A direct chat has no invite data of its own.
    assert_eq!(
        h.data.reports.ranking(ChatScope::Direct(7), 7, None).await,
        CommandOutcome::NoData
    );
    assert_eq!(h.membership.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_and_unknown_results() {
    let h = harness().await;

    assert_eq!(
        h.data.reports.top_inviters(CHAT, None).await,
        CommandOutcome::NoData
    );
    assert_eq!(
        h.data.reports.my_invites(CHAT, 1).await,
        CommandOutcome::MyInvites {
            count: 0,
            position: None
        }
    );
    assert_eq!(
        h.data.reports.who_added(CHAT, &TargetRef::default()).await,
        CommandOutcome::TargetMissing
    );
    assert_eq!(
        h.data.reports.who_added(CHAT, &by_token("@ghost")).await,
        CommandOutcome::TargetMissing
    );
    assert_eq!(
        h.data.reports.who_added(CHAT, &by_token("404")).await,
        CommandOutcome::NotFound
    );

    h.data
        .tracker
        .handle(&joined_alone(user(4, "dave")), 100)
        .await
        .unwrap();
    assert_eq!(
        h.data.reports.top_inviters(CHAT, None).await,
        CommandOutcome::NoData
    );
}

#[tokio::test]
async fn test_reply_goes_through_notifier() {
    let h = harness().await;

    let outcome = h.data.reports.top_inviters(CHAT, None).await;
    h.data
        .notifier
        .reply(77, None, &outcome.to_string(), None)
        .await
        .unwrap();

    let sent = h.replies.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![(77, "No invite data available yet.".to_string())]);
}
