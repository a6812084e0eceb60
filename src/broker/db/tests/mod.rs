mod role;

use super::Database;

pub fn run_all_tests(db: &Database) {
    service::run_service_tests(db);
    service::run_rollback_tests(db);
    service::run_gate_tests(db);

    role::run_role_tests(db);
}
