use ipn::{FileStore, StateStore};

use crate::cli::StateAction;
use crate::config::EffectiveConfig;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, StateChangeView, StateEntriesView, StateEntryView, print_result};

pub fn run(config: &EffectiveConfig, action: StateAction, format: OutputFormat) -> Result<()> {
	let store = FileStore::load(&config.state_file);
	let path = store.path().to_path_buf();

	match action {
		StateAction::List => {
			let view = StateEntriesView {
				path,
				entries: store.entries(),
			};
			print_result(&ResultBuilder::new("state.list").data(view).build(), format);
		}
		StateAction::Get { key } => {
			let value = store.get(&key)?;
			print_result(&ResultBuilder::new("state.get").data(StateEntryView { key, value }).build(), format);
		}
		StateAction::Set { key, value } => {
			store.set(&key, &value)?;
			let view = StateChangeView {
				path,
				key: Some(key),
				changed: true,
			};
			print_result(&ResultBuilder::new("state.set").data(view).build(), format);
		}
		StateAction::Remove { key } => {
			let changed = store.remove(&key)?;
			let view = StateChangeView {
				path,
				key: Some(key),
				changed,
			};
			print_result(&ResultBuilder::new("state.remove").data(view).build(), format);
		}
		StateAction::Clear => {
			let changed = store.clear()?;
			let view = StateChangeView { path, key: None, changed };
			print_result(&ResultBuilder::new("state.clear").data(view).build(), format);
		}
	}
	Ok(())
}
