//! Seeder port - 初期タスクの供給

use crate::domain::Follow;

/// Produces the initial task-likes of a run, invoked once per `Crawler::run`
/// with the run arguments. Bare targets get the configured seed priority.
pub trait Seeder<C>: Send + Sync {
    fn produce(&self, args: &[String]) -> Vec<Follow<C>>;
}

impl<C, F> Seeder<C> for F
where
    F: Fn(&[String]) -> Vec<Follow<C>> + Send + Sync,
{
    fn produce(&self, args: &[String]) -> Vec<Follow<C>> {
        self(args)
    }
}

/// Default seeder: every non-empty argument is a seed target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgsSeeder;

impl<C> Seeder<C> for ArgsSeeder {
    fn produce(&self, args: &[String]) -> Vec<Follow<C>> {
        args.iter()
            .map(|arg| arg.trim())
            .filter(|arg| !arg.is_empty())
            .map(Follow::from)
            .collect()
    }
}
