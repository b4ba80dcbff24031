use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Create a Lua runtime with the `depforge` global table:
///
/// - `depforge.dir` - directory of the file being evaluated
/// - `depforge.platform` - host operating system (`linux`, `macos`, `windows`, ...)
/// - `depforge.join(...)` - join path segments with the host separator
///
/// Modules next to the evaluated file can be loaded with `require`.
pub fn create_runtime(dir: &Path) -> LuaResult<Lua> {
  let lua = Lua::new();

  let package = lua.globals().get::<LuaTable>("package")?;
  let package_path = package.get::<String>("path")?;
  let local = dir.join("?.lua");
  package.set("path", format!("{};{}", local.to_string_lossy(), package_path))?;

  let depforge = lua.create_table()?;
  depforge.set("dir", dir.to_string_lossy().to_string())?;
  depforge.set("platform", std::env::consts::OS)?;
  depforge.set(
    "join",
    lua.create_function(|_, segments: LuaMultiValue| {
      let mut joined = PathBuf::new();
      for segment in segments {
        match segment {
          LuaValue::String(s) => joined.push(s.to_str()?.as_ref()),
          other => {
            return Err(LuaError::external(format!(
              "depforge.join expects strings, got {}",
              other.type_name()
            )));
          }
        }
      }
      Ok(joined.to_string_lossy().into_owned())
    })?,
  )?;
  lua.globals().set("depforge", depforge)?;

  Ok(lua)
}

/// Evaluate `content` as the chunk named after `path`.
pub fn eval_chunk(lua: &Lua, path: &Path, content: &str) -> LuaResult<LuaValue> {
  lua.load(content).set_name(format!("@{}", path.display())).eval::<LuaValue>()
}
