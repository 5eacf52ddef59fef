//! Local, duration-agnostic partitioning used when the coordination service
//! is unavailable or returns an error plan.

use std::collections::BTreeMap;

use super::{Task, TestCase, TestPlan};

/// Build a plan from the locally discovered files alone.
///
/// Nodes cannot share their file lists, so the result must be a pure
/// function of the file set and `parallelism`: files are sorted and then
/// dealt round-robin. Every node index in `0..parallelism` gets a task, even
/// when there are fewer files than nodes.
pub fn create_fallback_plan(files: &[String], parallelism: usize) -> TestPlan {
    let mut tasks: BTreeMap<String, Task> = (0..parallelism)
        .map(|node| {
            (
                node.to_string(),
                Task {
                    node_number: node,
                    tests: Vec::new(),
                },
            )
        })
        .collect();

    if parallelism == 0 {
        return TestPlan {
            tasks,
            experiment: None,
        };
    }

    let mut sorted: Vec<&String> = files.iter().collect();
    sorted.sort();

    for (i, file) in sorted.into_iter().enumerate() {
        let node = i % parallelism;
        if let Some(task) = tasks.get_mut(&node.to_string()) {
            task.tests.push(TestCase::file(file.clone()));
        }
    }

    TestPlan {
        tasks,
        experiment: None,
    }
}
