//! Command-line parsing and dispatch.

use clap::{Parser, Subcommand};
use kurbo::Point;
use roomplan_core::{
    CatalogItem, DEFAULT_POPULAR_LIMIT, GroupId, InstanceId, Modifiers, PlannerConfig, RoomId, ShortcutRegistry,
    execute,
};
use std::path::PathBuf;

use crate::app::{App, AppResult};

#[derive(Debug, Parser)]
#[command(name = "roomplan", about = "Plan furniture layouts in rooms", version)]
pub struct Cli {
    /// Config file (JSON). Defaults to `roomplan/config.json` in the user config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory, overriding the config file.
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List stored rooms.
    Rooms,

    /// Create or resize a room.
    #[command(name = "room-create")]
    RoomCreate {
        id: RoomId,
        name: String,
        width: f64,
        height: f64,
    },

    /// Delete a room and its placements.
    #[command(name = "room-delete")]
    RoomDelete { id: RoomId },

    /// List active catalog items.
    Catalog,

    /// Add or replace a catalog item.
    #[command(name = "catalog-add")]
    CatalogAdd {
        id: u32,
        code: String,
        name: String,
        width: f64,
        length: f64,
        height: f64,
    },

    /// Catalog usage across all rooms.
    Stats {
        /// How many of the most placed items to list.
        #[arg(long, default_value_t = DEFAULT_POPULAR_LIMIT)]
        limit: usize,
    },

    /// Show a room and its placements.
    Show {
        room: RoomId,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Report placements that break the room rules.
    Check { room: RoomId },

    /// Place a catalog item by code.
    Place { room: RoomId, code: String, x: f64, y: f64 },

    /// Move a placement.
    Move { room: RoomId, instance: InstanceId, x: f64, y: f64 },

    /// Rotate a placement to a quarter turn.
    Rotate { room: RoomId, instance: InstanceId, degrees: f64 },

    /// Remove a placement.
    Remove { room: RoomId, instance: InstanceId },

    /// Group placements so they move together.
    Group {
        room: RoomId,
        #[arg(required = true, num_args = 2..)]
        instances: Vec<InstanceId>,
    },

    /// Dissolve a group.
    Ungroup { room: RoomId, group: GroupId },

    /// Remove every placement from a room.
    Clear { room: RoomId },

    /// Apply a keyboard shortcut to selected placements.
    Key {
        room: RoomId,
        key: String,
        #[arg(long)]
        ctrl: bool,
        #[arg(long)]
        shift: bool,
        /// Selected placements.
        #[arg(long = "select", num_args = 1..)]
        selection: Vec<InstanceId>,
    },

    /// Print keyboard shortcuts.
    Shortcuts,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("roomplan").join("config.json"))
}

fn load_config(cli: &Cli) -> AppResult<PlannerConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => PlannerConfig::load(path)?,
        None => match default_config_path() {
            Some(path) => PlannerConfig::load_or_default(&path)?,
            None => PlannerConfig::default(),
        },
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

pub fn run_from_env() -> AppResult<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> AppResult<()> {
    if let Commands::Shortcuts = cli.command {
        print_shortcuts();
        return Ok(());
    }

    let mut app = App::open(load_config(&cli)?)?;
    match cli.command {
        Commands::Rooms => {
            for room in app.rooms()? {
                println!("{:>4}  {:<24} {} x {} {}", room.id, room.name, room.width, room.height, room.unit);
            }
        }
        Commands::RoomCreate { id, name, width, height } => {
            let room = app.create_room(id, &name, width, height)?;
            println!("Room {} saved in {}", room.id, app.data_dir().display());
        }
        Commands::RoomDelete { id } => app.delete_room(id)?,
        Commands::Catalog => {
            for item in app.catalog().active() {
                println!(
                    "{:<10} {:<24} {:?} {} x {} x {}",
                    item.code, item.name, item.kind, item.width, item.length, item.height
                );
            }
        }
        Commands::CatalogAdd {
            id,
            code,
            name,
            width,
            length,
            height,
        } => app.put_catalog_item(CatalogItem::new(id, code, name, width, length, height))?,
        Commands::Stats { limit } => {
            let report = app.stats(limit)?;
            println!("Placements by type:");
            for (kind, count) in &report.by_kind {
                println!("  {:<14} {}", format!("{:?}", kind), count);
            }
            println!("Most placed:");
            for (item, count) in &report.popular {
                println!("  {:<10} {:<24} {}", item.code, item.name, count);
            }
        }
        Commands::Show { room, json } => {
            if json {
                println!("{}", app.export_json(room)?);
            } else {
                print!("{}", app.describe(room)?);
            }
        }
        Commands::Check { room } => {
            let conflicts = app.check(room)?;
            if conflicts.is_empty() {
                println!("No conflicts");
            }
            for (id, result) in conflicts {
                println!("#{}: {}", id, result.messages().join("; "));
            }
        }
        Commands::Place { room, code, x, y } => {
            let id = app.place(room, &code, Point::new(x, y))?;
            println!("Placed #{}", id);
        }
        Commands::Move { room, instance, x, y } => {
            app.edit(room, |planner| planner.move_item(instance, Point::new(x, y)))?
        }
        Commands::Rotate { room, instance, degrees } => {
            let rotation = app.edit(room, |planner| planner.rotate_item(instance, degrees))?;
            println!("#{} rotated to {}°", instance, rotation.degrees());
        }
        Commands::Remove { room, instance } => {
            app.edit(room, |planner| planner.remove_item(instance))?;
        }
        Commands::Group { room, instances } => {
            let group = app.edit(room, |planner| planner.group(&instances))?;
            println!("Group {}", group);
        }
        Commands::Ungroup { room, group } => {
            let members = app.edit(room, |planner| Ok(planner.ungroup(group)))?;
            println!("Released {:?}", members);
        }
        Commands::Clear { room } => {
            let count = app.edit(room, |planner| Ok(planner.clear()))?;
            println!("Removed {} placements", count);
        }
        Commands::Key {
            room,
            key,
            ctrl,
            shift,
            selection,
        } => {
            let modifiers = Modifiers {
                ctrl,
                shift,
                ..Modifiers::NONE
            };
            match ShortcutRegistry::lookup(&key, modifiers) {
                Some(command) => {
                    let mut planner = app.session(room)?;
                    let outcome = pollster::block_on(execute(&mut planner, command, &selection))?;
                    if planner.is_dirty() {
                        pollster::block_on(planner.save())?;
                    }
                    println!("{:?}", outcome);
                }
                None => println!("No shortcut for {}", key),
            }
        }
        Commands::Shortcuts => print_shortcuts(),
    }
    Ok(())
}

/// Print all shortcuts to console.
pub fn print_shortcuts() {
    println!("\n=== Keyboard Shortcuts ===");
    for shortcut in ShortcutRegistry::all() {
        println!("  {:20} {}", shortcut.format(), shortcut.description);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli(dir: &std::path::Path, command: Commands) -> Cli {
        Cli {
            config: Some(dir.join("missing-config.json")),
            data_dir: Some(dir.to_path_buf()),
            command,
        }
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from(["roomplan", "--data-dir", "/tmp/x", "group", "3", "1", "2"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Group { room: 3, ref instances } if instances == &vec![1, 2]));
        assert!(Cli::try_parse_from(["roomplan", "group", "3", "1"]).is_err());

        let cli = Cli::try_parse_from(["roomplan", "stats"]).unwrap();
        assert!(matches!(cli.command, Commands::Stats { limit: DEFAULT_POPULAR_LIMIT }));
    }

    #[test]
    fn test_shortcuts_need_no_data_dir() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/config.json")),
            data_dir: None,
            command: Commands::Shortcuts,
        };
        assert!(run(cli).is_ok());
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempdir().unwrap();
        let err = run(cli(dir.path(), Commands::Rooms)).unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_commands_edit_stored_room() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(&config, "{}").unwrap();
        let with = |command| Cli {
            config: Some(config.clone()),
            data_dir: Some(dir.path().to_path_buf()),
            command,
        };

        run(with(Commands::RoomCreate {
            id: 1,
            name: "Office".to_string(),
            width: 500.0,
            height: 400.0,
        }))
        .unwrap();
        run(with(Commands::CatalogAdd {
            id: 1,
            code: "DS-01".to_string(),
            name: "Desk".to_string(),
            width: 140.0,
            length: 70.0,
            height: 75.0,
        }))
        .unwrap();
        for x in [0.0, 200.0] {
            run(with(Commands::Place {
                room: 1,
                code: "DS-01".to_string(),
                x,
                y: 0.0,
            }))
            .unwrap();
        }
        run(with(Commands::Key {
            room: 1,
            key: "g".to_string(),
            ctrl: false,
            shift: false,
            selection: vec![1, 2],
        }))
        .unwrap();

        let app = App::open(PlannerConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..PlannerConfig::default()
        })
        .unwrap();
        let planner = app.session(1).unwrap();
        assert_eq!(planner.layout().group_members(1), vec![1, 2]);

        let err = run(with(Commands::Move {
            room: 1,
            instance: 2,
            x: 100.0,
            y: 0.0,
        }))
        .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
