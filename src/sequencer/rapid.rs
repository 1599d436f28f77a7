//! RAPID motion program export

use std::fmt::Write;

use super::Waypoint;

/// Default name of the exported module file.
pub const DEFAULT_EXPORT_FILE: &str = "Waypoints.mod";

/// Default RAPID module name.
pub const DEFAULT_MODULE_NAME: &str = "Module1";

/// External axes are unused on a six-axis arm; RAPID's 9E9 marks them so.
const EXTERNAL_AXES: &str = "[9E9,9E9,9E9,9E9,9E9,9E9]";

/// Render `waypoints` as a RAPID module with one `MoveAbsJ` per waypoint.
pub(crate) fn render_module(module_name: &str, waypoints: &[Waypoint]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = writeln!(out, "MODULE {}", module_name);
    out.push_str("VAR jointtarget waypoint;\n");
    out.push_str("PROC Main()\n");

    for waypoint in waypoints {
        let joints: Vec<String> = waypoint.joints.iter().map(|j| format!("{:.2}", j)).collect();
        let _ = writeln!(out, "  waypoint := [[{}], {}];", joints.join(","), EXTERNAL_AXES);
        out.push_str("  MoveAbsJ waypoint, v100, fine, tool0;\n");
    }

    out.push_str("ENDPROC\n");
    out.push_str("ENDMODULE");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JointVector;

    #[test]
    fn module_layout() {
        let waypoints = [
            Waypoint::new(JointVector::new([0.0, 10.0, -20.0, 30.0, 40.5, -50.25])),
            Waypoint::new(JointVector::new([90.0, 0.0, 0.0, 0.0, 0.0, 0.0])),
        ];

        let expected = "MODULE Module1\n\
VAR jointtarget waypoint;\n\
PROC Main()\n  \
waypoint := [[0.00,10.00,-20.00,30.00,40.50,-50.25], [9E9,9E9,9E9,9E9,9E9,9E9]];\n  \
MoveAbsJ waypoint, v100, fine, tool0;\n  \
waypoint := [[90.00,0.00,0.00,0.00,0.00,0.00], [9E9,9E9,9E9,9E9,9E9,9E9]];\n  \
MoveAbsJ waypoint, v100, fine, tool0;\n\
ENDPROC\n\
ENDMODULE";
        assert_eq!(render_module(DEFAULT_MODULE_NAME, &waypoints), expected);
    }

    #[test]
    fn module_name_is_used() {
        let waypoints = [Waypoint::new(JointVector::ZERO)];
        assert!(render_module("PickPlace", &waypoints).starts_with("MODULE PickPlace\n"));
    }
}
