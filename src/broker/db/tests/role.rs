use crate::broker::db::{Database, RoleRecord};
use crate::time::{advance_mock_time, current_timestamp};

pub fn run_role_tests(db: &Database) {
    let roles = [mock_role("analytics"), mock_role("webapp")];

    db.with_transaction(|tx| {
        for role in roles.iter() {
            assert!(!tx.is_role_exists(&role.name).unwrap());
            tx.create_role(role).unwrap();
            assert!(tx.is_role_exists(&role.name).unwrap());
            assert_eq!(&tx.get_role(&role.name).unwrap(), role);
        }
        assert!(tx.create_role(&roles[0]).is_err());
        Ok(())
    })
    .unwrap();

    advance_mock_time(10);
    let now = current_timestamp();
    db.with_transaction(|tx| {
        tx.update_role_policy("webapp", "{\"Version\":\"2012-10-17\"}", now)
            .unwrap();
        let role = tx.get_role("webapp").unwrap();
        assert_eq!(role.policy, "{\"Version\":\"2012-10-17\"}");
        assert_eq!(role.update_time, now);
        assert!(role.update_time > role.create_time);

        assert!(tx.update_role_policy("missing", "{}", now).is_err());
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        let names: Vec<String> = tx.list_roles().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["analytics", "webapp"]);

        for role in roles.iter() {
            tx.delete_role(&role.name).unwrap();
        }
        assert!(tx.list_roles().unwrap().is_empty());
        // Deleting an absent role is not an error.
        tx.delete_role("analytics").unwrap();
        Ok(())
    })
    .unwrap();
}

fn mock_role(name: &str) -> RoleRecord {
    let now = current_timestamp();
    RoleRecord {
        name: name.to_string(),
        arn: format!("arn:aws:iam::000000000000:role/service-role/{name}-s3-access-role"),
        policy: String::from("{}"),
        create_time: now,
        update_time: now,
    }
}
