//! `proctor admin`: tests, accounts and assignments.

use std::path::Path;
use std::str::FromStr;

use proctor_core::{TestDraft, TestRecord, UserRecord, UserRole};
use proctor_session::{AccountService, AdminService, AssignOutcome};

use crate::cli::{AdminCommand, AdminOpts, CreateTestOpts};
use crate::context::{LocalContext, status_label};

fn draft_from(opts: &CreateTestOpts) -> TestDraft {
    let mut draft = TestDraft {
        title: opts.title.trim().to_string(),
        role: opts.role.trim().to_string(),
        duration_minutes: opts.duration_minutes,
        viva_enabled: !opts.no_viva,
        ..TestDraft::default()
    };
    for topic in &opts.topics {
        draft.add_topic(topic);
    }
    draft
}

fn format_tests(tests: &[TestRecord]) -> String {
    tests
        .iter()
        .map(|t| {
            let topics: Vec<&str> = t.topics.iter().map(String::as_str).collect();
            format!(
                "{}  {}  ({}, {} min{})  [{}]",
                t.id,
                t.title,
                t.role,
                t.duration_minutes,
                if t.viva_enabled { ", viva" } else { "" },
                topics.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_users(users: &[UserRecord]) -> String {
    users
        .iter()
        .map(|u| format!("{}  {} <{}>", u.uid, u.display_name, u.email))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Entry point for `proctor admin`.
pub async fn cmd_admin(store_path: &Path, opts: &AdminOpts) -> anyhow::Result<()> {
    let ctx = LocalContext::open(store_path).await?;
    let actor = ctx.actor(opts.actor.as_deref()).await?;
    let admin = AdminService::new(ctx.store.clone(), ctx.clock.clone());
    let require_actor = || {
        actor
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("--as <UID> of an administrator is required"))
    };

    match &opts.command {
        AdminCommand::CreateTest(create) => {
            let record = admin.create_test(require_actor()?, draft_from(create)).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        AdminCommand::CreateUser(create) => {
            let accounts = AccountService::new(
                ctx.identity.clone(),
                ctx.store.clone(),
                ctx.navigator.clone(),
                ctx.clock.clone(),
            );
            let role = UserRole::from_str(&create.role)?;
            let record = accounts
                .create_user(
                    actor.as_ref(),
                    &create.email,
                    &create.password,
                    &create.name,
                    role,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        AdminCommand::Assign(assign) => {
            match admin
                .assign_test(require_actor()?, &assign.test, &assign.user)
                .await?
            {
                AssignOutcome::Created(record) => println!("assigned {}", record.id),
                AssignOutcome::AlreadyAssigned(id) => {
                    println!("Test already assigned to this user ({id})")
                }
            }
        }
        AdminCommand::Tests => {
            let tests = admin.list_tests(require_actor()?).await?;
            if tests.is_empty() {
                println!("no tests");
            } else {
                println!("{}", format_tests(&tests));
            }
        }
        AdminCommand::Assignments => {
            let assignments = admin.list_assignments(require_actor()?).await?;
            for a in &assignments {
                println!(
                    "{}  {}  {}  {}",
                    a.id,
                    a.test_id,
                    a.user_id,
                    status_label(a.status)
                );
            }
        }
        AdminCommand::Candidates => {
            let users = admin.list_candidates(require_actor()?).await?;
            if users.is_empty() {
                println!("no candidates");
            } else {
                println!("{}", format_users(&users));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{AssignOpts, CreateUserOpts};
    use proctor_session::ports::DocumentStore;

    fn create_user(email: &str, role: &str) -> AdminOpts {
        AdminOpts {
            actor: None,
            command: AdminCommand::CreateUser(CreateUserOpts {
                email: email.into(),
                password: "secret1".into(),
                name: String::new(),
                role: role.into(),
            }),
        }
    }

    #[test]
    fn draft_dedupes_topics() {
        let draft = draft_from(&CreateTestOpts {
            title: " Backend ".into(),
            role: "Engineer".into(),
            topics: vec!["rust".into(), " rust ".into(), "sql".into(), "".into()],
            duration_minutes: 30,
            no_viva: true,
        });
        assert_eq!(draft.title, "Backend");
        assert_eq!(draft.topics.len(), 2);
        assert!(!draft.viva_enabled);
        assert!(draft.validate().is_ok());
    }

    #[tokio::test]
    async fn bootstrap_admin_then_assign() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join("store.json");

        cmd_admin(&path, &create_user("root@example.com", "admin"))
            .await
            .expect("first admin");
        // Second account needs an admin actor.
        assert!(
            cmd_admin(&path, &create_user("dana@example.com", "user"))
                .await
                .is_err()
        );

        let ctx = LocalContext::open(&path).await.expect("open");
        let admin_uid = ctx.store.list_users(Some(UserRole::Admin)).await.expect("list")[0]
            .uid
            .clone();
        let mut opts = create_user("dana@example.com", "user");
        opts.actor = Some(admin_uid.clone());
        cmd_admin(&path, &opts).await.expect("candidate");

        let ctx = LocalContext::open(&path).await.expect("reopen");
        let candidate = ctx.store.list_users(Some(UserRole::User)).await.expect("list")[0]
            .uid
            .clone();
        let actor = ctx.actor(Some(&admin_uid)).await.expect("actor").expect("some");
        let test = AdminService::new(ctx.store.clone(), ctx.clock.clone())
            .create_test(
                &actor,
                draft_from(&CreateTestOpts {
                    title: "Backend".into(),
                    role: "Engineer".into(),
                    topics: vec!["rust".into()],
                    duration_minutes: 45,
                    no_viva: false,
                }),
            )
            .await
            .expect("test");

        let assign = AdminOpts {
            actor: Some(admin_uid),
            command: AdminCommand::Assign(AssignOpts {
                test: test.id.clone(),
                user: candidate.clone(),
            }),
        };
        cmd_admin(&path, &assign).await.expect("assign");
        cmd_admin(&path, &assign).await.expect("assign again");

        let ctx = LocalContext::open(&path).await.expect("reopen");
        let assignments = ctx
            .store
            .list_assignments(Some(&candidate))
            .await
            .expect("assignments");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].test_id, test.id);
    }

    #[tokio::test]
    async fn listing_requires_actor() {
        let dir = tempfile::tempdir().expect("tmp");
        let opts = AdminOpts {
            actor: None,
            command: AdminCommand::Tests,
        };
        let err = cmd_admin(&dir.path().join("s.json"), &opts).await.unwrap_err();
        assert!(err.to_string().contains("--as"));
    }
}
